use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use relay_core::RelayConfig;
use relay_stream::UpstreamClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub upstream: UpstreamClient,
    /// Live chat streams: stream_id -> cancellation token. Entries are
    /// removed when the producer task exits.
    pub active_streams: DashMap<String, CancellationToken>,
}

impl AppState {
    pub fn new(config: RelayConfig, upstream: UpstreamClient) -> Self {
        Self {
            config,
            upstream,
            active_streams: DashMap::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/chat", post(crate::http::chat::chat_handler))
        .route(
            "/api/chat/{stream_id}/stop",
            post(crate::http::stop::stop_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
