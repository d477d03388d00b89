//! Service info, health and statistics routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use falldetect_store::CacheStats;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats", get(get_stats))
}

/// GET /: service banner.
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "FallDetect",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

/// GET /health: backend readiness and store connectivity.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let resource_ready = state.gate.is_ready();
    let store_connected = state.cache.ping();

    Json(serde_json::json!({
        "status": if resource_ready && store_connected { "healthy" } else { "unhealthy" },
        "resource_ready": resource_ready,
        "store_connected": store_connected,
        "cache_write_failures": state.orchestrator.cache_write_failures(),
    }))
}

/// GET /stats: aggregates computed by the store.
async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStats>> {
    Ok(Json(state.cache.stats()?))
}
