//! Classification routes: single image and batch upload (multipart).

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};

use falldetect_core::Error;
use falldetect_runtime::{check_content_type, BatchInput, ClassificationResponse};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/classify", post(classify))
        .route("/classify-batch", post(classify_batch))
}

/// POST /classify: classify the first uploaded file.
async fn classify(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClassificationResponse>> {
    let upload = next_upload(&mut multipart)
        .await?
        .ok_or_else(|| Error::InvalidInput("No file uploaded".to_string()))?;
    check_content_type(upload.content_type.as_deref())?;

    // Runs to completion even if the client goes away.
    let response = tokio::task::spawn_blocking(move || {
        state.orchestrator.handle_request(&upload.bytes)
    })
    .await??;

    Ok(Json(response))
}

/// POST /classify-batch: classify up to `max_batch_size` files.
async fn classify_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.orchestrator.is_ready() {
        return Err(Error::ResourceNotReady("service warming up".to_string()).into());
    }

    let max = state.orchestrator.max_batch();
    let mut uploads = Vec::new();
    while let Some(upload) = next_upload(&mut multipart).await? {
        if uploads.len() == max {
            return Err(Error::InvalidInput(format!("Maximum {} images per batch", max)).into());
        }
        uploads.push(upload);
    }

    let results =
        tokio::task::spawn_blocking(move || state.orchestrator.handle_batch(uploads)).await??;

    Ok(Json(serde_json::json!({ "results": results })))
}

/// Read the next file field, skipping plain form fields.
async fn next_upload(multipart: &mut Multipart) -> ApiResult<Option<BatchInput>> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(Error::InvalidInput(format!("Malformed multipart body: {}", e)).into())
            }
        };
        let Some(filename) = field.file_name().map(|n| n.to_string()) else {
            continue;
        };
        let content_type = field.content_type().map(|c| c.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(format!("Read failed: {}", e)))?;

        return Ok(Some(BatchInput {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
}
