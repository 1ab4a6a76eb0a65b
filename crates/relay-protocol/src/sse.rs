//! SSE framing: every event is one `data:` line followed by a blank line.

use crate::ui::UiEvent;

/// Terminal sentinel, the last bytes of every response body.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Response headers every UI message stream carries.
pub const CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";
pub const CACHE_CONTROL: &str = "no-cache, no-transform";
pub const CONNECTION: &str = "keep-alive";

/// Encode one event as `data: <json>\n\n`.
pub fn encode(event: &UiEvent) -> serde_json::Result<String> {
    let json = serde_json::to_string(event)?;
    Ok(format!("data: {}\n\n", json))
}
