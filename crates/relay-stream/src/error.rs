use relay_core::RelayError;
use thiserror::Error;

/// Failure to get a streaming response started. Surfaced to the client as
/// a single non-stream error response.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("upstream did not respond within {ms}ms")]
    Timeout { ms: u64 },

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl From<ConnectError> for RelayError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::Timeout { ms } => RelayError::UpstreamTimeout { ms },
            ConnectError::Unreachable(msg) => RelayError::UpstreamUnreachable(msg),
            ConnectError::Status { status, message } => {
                RelayError::UpstreamStatus { status, message }
            }
        }
    }
}

/// Failure while writing the outbound stream.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The response body was dropped: the client disconnected.
    #[error("downstream sink closed")]
    SinkClosed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
