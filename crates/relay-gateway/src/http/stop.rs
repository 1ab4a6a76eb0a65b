//! Explicit cancellation of one live chat stream.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;

/// POST /api/chat/{stream_id}/stop
///
/// Fires the session's cancellation token. The producer task finalizes the
/// stream (`finish`, `[DONE]`) and removes itself from the registry, so a
/// second stop for the same id is a 404.
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.active_streams.get(&stream_id) {
        Some(entry) => {
            entry.value().cancel();
            info!(stream_id = %stream_id, "stream stop requested");
            Ok(Json(json!({ "stopped": stream_id })))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "code": "STREAM_NOT_FOUND",
                    "message": format!("no active stream with id {}", stream_id),
                }
            })),
        )),
    }
}
