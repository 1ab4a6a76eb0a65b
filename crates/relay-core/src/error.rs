use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream did not respond within {ms}ms")]
    UpstreamTimeout { ms: u64 },

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Short error code string sent to clients in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            RelayError::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            RelayError::UpstreamStatus { .. } => "UPSTREAM_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the gateway answers with when this error ends a request
    /// before streaming starts.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::UpstreamTimeout { .. } => 504,
            RelayError::UpstreamUnreachable(_) => 502,
            RelayError::UpstreamStatus { status, .. } => *status,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
