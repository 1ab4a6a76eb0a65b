use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Single-character type tag at the start of every backend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// `0`: assistant text delta.
    Text,
    /// `2`: data / metadata items (artifacts, conversation ids).
    Data,
    /// `3`: backend-reported error.
    Error,
    /// `7`: tool call streaming started.
    ToolCallStart,
    /// `8`: partial tool arguments.
    ToolArgDelta,
    /// `9`: tool call with complete arguments.
    ToolCallComplete,
    /// `a`: tool execution result.
    ToolResult,
    /// `d`: end of the assistant message.
    FinishMessage,
    /// `e`: end of one model step.
    FinishStep,
    /// `f`: start of one model step.
    StartStep,
}

impl FrameTag {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '0' => FrameTag::Text,
            '2' => FrameTag::Data,
            '3' => FrameTag::Error,
            '7' => FrameTag::ToolCallStart,
            '8' => FrameTag::ToolArgDelta,
            '9' => FrameTag::ToolCallComplete,
            'a' => FrameTag::ToolResult,
            'd' => FrameTag::FinishMessage,
            'e' => FrameTag::FinishStep,
            'f' => FrameTag::StartStep,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            FrameTag::Text => '0',
            FrameTag::Data => '2',
            FrameTag::Error => '3',
            FrameTag::ToolCallStart => '7',
            FrameTag::ToolArgDelta => '8',
            FrameTag::ToolCallComplete => '9',
            FrameTag::ToolResult => 'a',
            FrameTag::FinishMessage => 'd',
            FrameTag::FinishStep => 'e',
            FrameTag::StartStep => 'f',
        }
    }
}

/// Why a line did not become an [`UpstreamEvent`]. None of these are fatal
/// to a stream; the caller skips the line.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("line has no tag separator")]
    MissingSeparator,

    #[error("unrecognized frame tag {0:?}")]
    UnknownTag(String),

    #[error("invalid JSON in '{tag}' frame: {source}")]
    InvalidJson {
        tag: char,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected payload shape in '{tag}' frame")]
    UnexpectedShape { tag: char },
}

impl FrameError {
    /// Unknown tags are forward-compatible additions, not upstream bugs.
    pub fn is_unknown_tag(&self) -> bool {
        matches!(self, FrameError::UnknownTag(_))
    }
}

/// One backend line split into its tag and untouched payload text.
/// Wire: `9:{"toolCallId":"t1","toolName":"lookup","args":{}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    pub tag: FrameTag,
    pub payload: &'a str,
}

impl<'a> RawFrame<'a> {
    pub fn split(line: &'a str) -> Result<Self, FrameError> {
        let (tag, payload) = line.split_once(':').ok_or(FrameError::MissingSeparator)?;

        let mut chars = tag.chars();
        let tag = match (chars.next(), chars.next()) {
            (Some(c), None) => {
                FrameTag::from_char(c).ok_or_else(|| FrameError::UnknownTag(c.to_string()))?
            }
            _ => return Err(FrameError::UnknownTag(tag.to_string())),
        };

        Ok(Self { tag, payload })
    }
}

/// Typed backend event, one per successfully parsed line.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    TextDelta {
        text: String,
    },
    /// Payload normalized to a list; a single object becomes one item.
    Data {
        items: Vec<Value>,
    },
    Error {
        message: String,
    },
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolArgDelta {
        tool_call_id: String,
        args_text_delta: String,
    },
    ToolCallComplete {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    FinishMessage,
    FinishStep,
    StartStep,
}

impl UpstreamEvent {
    /// Split and parse one complete line.
    pub fn parse_line(line: &str) -> Result<Self, FrameError> {
        Self::from_frame(&RawFrame::split(line)?)
    }

    pub fn from_frame(frame: &RawFrame<'_>) -> Result<Self, FrameError> {
        let tag = frame.tag.as_char();
        let value: Value = serde_json::from_str(frame.payload)
            .map_err(|source| FrameError::InvalidJson { tag, source })?;
        let shape = |_| FrameError::UnexpectedShape { tag };

        Ok(match frame.tag {
            FrameTag::Text => match value {
                Value::String(text) => UpstreamEvent::TextDelta { text },
                Value::Object(mut map) => match map.remove("text") {
                    Some(Value::String(text)) => UpstreamEvent::TextDelta { text },
                    _ => return Err(FrameError::UnexpectedShape { tag }),
                },
                _ => return Err(FrameError::UnexpectedShape { tag }),
            },
            FrameTag::Data => match value {
                Value::Array(items) => UpstreamEvent::Data { items },
                other => UpstreamEvent::Data { items: vec![other] },
            },
            FrameTag::Error => UpstreamEvent::Error {
                message: error_text(value),
            },
            FrameTag::ToolCallStart => {
                let p: ToolCallStartPayload = serde_json::from_value(value).map_err(shape)?;
                UpstreamEvent::ToolCallStart {
                    tool_call_id: p.tool_call_id,
                    tool_name: p.tool_name,
                }
            }
            FrameTag::ToolArgDelta => {
                let p: ToolArgDeltaPayload = serde_json::from_value(value).map_err(shape)?;
                UpstreamEvent::ToolArgDelta {
                    tool_call_id: p.tool_call_id,
                    args_text_delta: p.args_text_delta,
                }
            }
            FrameTag::ToolCallComplete => {
                let p: ToolCallPayload = serde_json::from_value(value).map_err(shape)?;
                UpstreamEvent::ToolCallComplete {
                    tool_call_id: p.tool_call_id,
                    tool_name: p.tool_name,
                    args: p.args,
                }
            }
            FrameTag::ToolResult => {
                let p: ToolResultPayload = serde_json::from_value(value).map_err(shape)?;
                UpstreamEvent::ToolResult {
                    tool_call_id: p.tool_call_id,
                    result: p.result,
                }
            }
            FrameTag::FinishMessage => UpstreamEvent::FinishMessage,
            FrameTag::FinishStep => UpstreamEvent::FinishStep,
            FrameTag::StartStep => UpstreamEvent::StartStep,
        })
    }
}

/// `3:"boom"` and `3:{"message":"boom"}` both become `boom`. Anything else
/// is kept as its JSON text so nothing is lost.
fn error_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Object(mut map) => match map.remove("message") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    }
}

// Backend payload types (private, deserialization only)

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallStartPayload {
    tool_call_id: String,
    tool_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolArgDeltaPayload {
    tool_call_id: String,
    args_text_delta: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    #[serde(default = "empty_object")]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultPayload {
    tool_call_id: String,
    #[serde(default)]
    result: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}
