use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Wire constants, must match what the chat client expects
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";
pub const CONVERSATION_HEADER: &str = "x-conversation-id";
pub const STREAM_ID_HEADER: &str = "x-stream-id";

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_RESPONSE_DEADLINE_SECS: u64 = 300;
pub const DEFAULT_UPSTREAM_BUDGET_PCT: u8 = 90;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024; // 4 MB per inbound line

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Where the inference backend lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:8000`.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Path of the streaming chat endpoint on the backend.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// TCP/TLS connect budget. Exceeding it is reported as a timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Response header the backend uses to announce a newly created
    /// conversation id.
    #[serde(default = "default_conversation_header")]
    pub conversation_header: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            chat_path: default_chat_path(),
            connect_timeout_ms: default_connect_timeout_ms(),
            conversation_header: default_conversation_header(),
        }
    }
}

impl UpstreamConfig {
    /// Full URL of the backend chat endpoint.
    pub fn chat_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.chat_path.starts_with('/') {
            format!("{}{}", base, self.chat_path)
        } else {
            format!("{}/{}", base, self.chat_path)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Per-session streaming limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Total time a chat response is allowed to take.
    #[serde(default = "default_response_deadline_secs")]
    pub response_deadline_secs: u64,
    /// Share of the deadline given to the upstream, in percent. The rest is
    /// headroom for flushing the terminal sequence.
    #[serde(default = "default_upstream_budget_pct")]
    pub upstream_budget_pct: u8,
    /// Outbound events buffered between the translator and the HTTP body.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Inbound lines longer than this are dropped.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            response_deadline_secs: DEFAULT_RESPONSE_DEADLINE_SECS,
            upstream_budget_pct: DEFAULT_UPSTREAM_BUDGET_PCT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl StreamConfig {
    pub fn response_deadline(&self) -> Duration {
        Duration::from_secs(self.response_deadline_secs)
    }

    /// Time the upstream may take before it is torn down. Always strictly
    /// shorter than [`response_deadline`](Self::response_deadline) for a
    /// non-zero deadline.
    pub fn upstream_budget(&self) -> Duration {
        let pct = u32::from(self.upstream_budget_pct.clamp(1, 99));
        self.response_deadline() * pct / 100
    }

    /// Bounded channel size; a zero capacity would panic in tokio.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_upstream_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_chat_path() -> String {
    "/api/chat".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_conversation_header() -> String {
    CONVERSATION_HEADER.to_string()
}
fn default_response_deadline_secs() -> u64 {
    DEFAULT_RESPONSE_DEADLINE_SECS
}
fn default_upstream_budget_pct() -> u8 {
    DEFAULT_UPSTREAM_BUDGET_PCT
}
fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `RELAY_UPSTREAM__BASE_URL=http://backend:8000`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        tracing::debug!(path = %path, "config loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chat-relay/relay.toml", home)
}
