//! Stored result lookup.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use falldetect_core::Error;
use falldetect_store::Fingerprint;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/result/{fingerprint}", get(get_result))
}

/// GET /result/{fingerprint}: the stored entry for a previously seen image.
async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let fingerprint: Fingerprint = raw.parse()?;
    let entry = state
        .cache
        .lookup(&fingerprint)?
        .ok_or_else(|| Error::NotFound("Result not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "fingerprint": entry.fingerprint,
        "verdict": entry.verdict,
        "confidence": entry.confidence,
        "image_size": entry.image_size(),
        "processing_time_ms": entry.processing_time_ms,
        "created_at": entry.created_at_rfc3339(),
        "cached": true,
    })))
}
