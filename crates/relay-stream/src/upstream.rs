use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use relay_core::config::{StreamConfig, UpstreamConfig};
use relay_core::RelayError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ConnectError;

/// HTTP client for the backend's streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    conversation_header: String,
    connect_timeout: Duration,
    budget: Duration,
}

/// A backend response whose status was a success and whose body has not
/// been read yet.
#[derive(Debug)]
pub struct UpstreamResponse {
    conversation_id: Option<String>,
    inner: reqwest::Response,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, stream: &StreamConfig) -> relay_core::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(upstream.connect_timeout())
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: upstream.chat_url(),
            conversation_header: upstream.conversation_header.clone(),
            connect_timeout: upstream.connect_timeout(),
            budget: stream.upstream_budget(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upstream share of the response deadline.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// POST the chat request and wait for response headers.
    ///
    /// `deadline` bounds the whole exchange up to the first body byte;
    /// passing it in lets time already spent on the request count against
    /// the budget. A non-2xx status is returned as an error carrying the
    /// backend's body text.
    pub async fn open(
        &self,
        body: &serde_json::Value,
        authorization: Option<&str>,
        deadline: Instant,
    ) -> Result<UpstreamResponse, ConnectError> {
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "text/plain")
            .json(body);
        if let Some(auth) = authorization {
            req = req.header("authorization", auth);
        }

        debug!(url = %self.url, "opening upstream stream");

        let resp = match tokio::time::timeout_at(deadline, req.send()).await {
            Err(_) => {
                let ms = millis(self.budget);
                warn!(url = %self.url, ms, "upstream did not answer in time");
                return Err(ConnectError::Timeout { ms });
            }
            Ok(Err(e)) => {
                warn!(url = %self.url, error = %e, "upstream request failed");
                return Err(self.classify(e.is_timeout(), e.to_string()));
            }
            Ok(Ok(resp)) => resp,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "upstream rejected chat request");
            return Err(ConnectError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let conversation_id = resp
            .headers()
            .get(self.conversation_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(UpstreamResponse {
            conversation_id,
            inner: resp,
        })
    }

    /// A transport error before headers arrived. The only timeout reqwest
    /// enforces here is the connect timeout; the budget is checked by the
    /// caller.
    fn classify(&self, timed_out: bool, detail: String) -> ConnectError {
        if timed_out {
            ConnectError::Timeout {
                ms: millis(self.connect_timeout),
            }
        } else {
            ConnectError::Unreachable(detail)
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl UpstreamResponse {
    /// Conversation id the backend announced in its response headers.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
        self.inner.bytes_stream().map_err(io::Error::other)
    }
}
