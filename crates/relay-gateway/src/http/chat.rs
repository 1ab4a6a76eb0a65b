//! Streaming chat endpoint: POST /api/chat
//!
//! The request body is passed through to the backend untouched, along with
//! the caller's `Authorization` header. Once the backend answers with a
//! success status the response becomes a UI message SSE stream; before that
//! point any failure is a single JSON error.
//!
//! Error: `{"error": {"code": "...", "message": "..."}}`

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderName, HeaderValue},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use relay_core::config::{CONVERSATION_HEADER, STREAM_ID_HEADER, UI_STREAM_HEADER, UI_STREAM_VERSION};
use relay_core::RelayError;
use relay_protocol::sse;
use relay_stream::{translate, SessionOptions, StreamSession, Translation};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let options = SessionOptions::from_config(&state.config.stream, Instant::now());
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let upstream = match state
        .upstream
        .open(&body, authorization, options.upstream_deadline)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => return error_response(RelayError::from(e)),
    };

    let session =
        StreamSession::new().with_conversation_id(upstream.conversation_id().map(String::from));
    let conversation_id = session.conversation_id().map(String::from);
    let stream_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    state
        .active_streams
        .insert(stream_id.clone(), cancel.clone());

    info!(
        stream_id = %stream_id,
        conversation_id = conversation_id.as_deref().unwrap_or("-"),
        "chat stream started"
    );

    let Translation { body, task } =
        translate(upstream.into_byte_stream(), session, options, cancel);

    // deregister once the producer is done, however it ended
    let registry = Arc::clone(&state);
    let reaped_id = stream_id.clone();
    tokio::spawn(async move {
        match task.await {
            Ok(report) => debug!(stream_id = %reaped_id, outcome = ?report.outcome, "stream task exited"),
            Err(e) => warn!(stream_id = %reaped_id, error = %e, "stream task panicked"),
        }
        registry.active_streams.remove(&reaped_id);
    });

    let mut response = Response::new(Body::from_stream(body.map(Ok::<_, Infallible>)));
    let out = response.headers_mut();
    out.insert(header::CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
    out.insert(header::CACHE_CONTROL, HeaderValue::from_static(sse::CACHE_CONTROL));
    out.insert(header::CONNECTION, HeaderValue::from_static(sse::CONNECTION));
    out.insert(
        HeaderName::from_static(UI_STREAM_HEADER),
        HeaderValue::from_static(UI_STREAM_VERSION),
    );
    if let Ok(value) = HeaderValue::from_str(&stream_id) {
        out.insert(HeaderName::from_static(STREAM_ID_HEADER), value);
    }
    if let Some(id) = conversation_id {
        match HeaderValue::from_str(&id) {
            Ok(value) => {
                out.insert(HeaderName::from_static(CONVERSATION_HEADER), value);
            }
            Err(_) => warn!(conversation_id = %id, "conversation id is not a valid header value"),
        }
    }
    response
}

/// Single non-stream error for failures before the first byte.
fn error_response(e: RelayError) -> Response {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        Json(json!({
            "error": {
                "code": e.code(),
                "message": e.to_string(),
            }
        })),
    )
        .into_response()
}
