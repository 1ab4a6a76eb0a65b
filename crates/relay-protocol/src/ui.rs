use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → Client UI message stream event.
/// Wire: `{ "type": "text-delta", "id": "...", "delta": "Hello" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    /// Always the first event of a response.
    Start,

    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },

    DataArtifact {
        id: String,
        data: Value,
    },
    DataConversation {
        data: ConversationData,
    },

    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },

    ToolInputStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    },
    ToolInputDelta {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "inputTextDelta")]
        input_text_delta: String,
    },
    ToolInputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        output: Value,
    },

    StartStep,
    FinishStep,

    /// Emitted at most once per response.
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationData {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
}

impl UiEvent {
    /// The `type` discriminator as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            UiEvent::Start => "start",
            UiEvent::TextStart { .. } => "text-start",
            UiEvent::TextDelta { .. } => "text-delta",
            UiEvent::TextEnd { .. } => "text-end",
            UiEvent::DataArtifact { .. } => "data-artifact",
            UiEvent::DataConversation { .. } => "data-conversation",
            UiEvent::Error { .. } => "error",
            UiEvent::ToolInputStart { .. } => "tool-input-start",
            UiEvent::ToolInputDelta { .. } => "tool-input-delta",
            UiEvent::ToolInputAvailable { .. } => "tool-input-available",
            UiEvent::ToolOutputAvailable { .. } => "tool-output-available",
            UiEvent::StartStep => "start-step",
            UiEvent::FinishStep => "finish-step",
            UiEvent::Finish => "finish",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        UiEvent::Error {
            error_text: message.into(),
        }
    }
}
