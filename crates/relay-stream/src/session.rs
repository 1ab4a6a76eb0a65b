use std::collections::HashMap;

use relay_protocol::ui::ConversationData;
use relay_protocol::{UiEvent, UpstreamEvent};
use serde_json::Value;
use tracing::debug;

/// Allocates ids for text segments and artifacts that arrive without one.
///
/// Ids are `<prefix>-<n>`; the random prefix keeps them unique across
/// sessions, the counter within one.
#[derive(Debug, Clone)]
pub struct IdGen {
    prefix: String,
    counter: u64,
}

impl IdGen {
    pub fn random() -> Self {
        let mut prefix = uuid::Uuid::new_v4().simple().to_string();
        prefix.truncate(12);
        Self::with_prefix(prefix)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}-{}", self.prefix, self.counter)
    }
}

/// Tool invocation seen on this stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRecord {
    pub tool_name: String,
    /// `tool-input-start` has been emitted for this id.
    pub started: bool,
}

/// Per-request translator state.
///
/// Owned by exactly one task; every upstream event is applied in arrival
/// order and produces the outbound events for it in the order they must be
/// written.
#[derive(Debug)]
pub struct StreamSession {
    ids: IdGen,
    /// Id of the open text segment, if any. At most one is open.
    open_text: Option<String>,
    tools: HashMap<String, ToolCallRecord>,
    finished: bool,
    /// Set from the upstream response header before the body flows.
    conversation_id: Option<String>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self::with_ids(IdGen::random())
    }

    pub fn with_ids(ids: IdGen) -> Self {
        Self {
            ids,
            open_text: None,
            tools: HashMap::new(),
            finished: false,
            conversation_id: None,
        }
    }

    /// Attach the conversation id negotiated with the backend. Blank ids
    /// are treated as absent.
    pub fn with_conversation_id(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Conversation id to announce in the response headers, set once before
    /// any body bytes flow.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply one upstream event, appending the resulting outbound events to
    /// `out`.
    pub fn apply(&mut self, event: UpstreamEvent, out: &mut Vec<UiEvent>) {
        match event {
            UpstreamEvent::TextDelta { text } => {
                if text.is_empty() {
                    return;
                }
                let id = match &self.open_text {
                    Some(id) => id.clone(),
                    None => {
                        let id = self.ids.next_id();
                        out.push(UiEvent::TextStart { id: id.clone() });
                        self.open_text = Some(id.clone());
                        id
                    }
                };
                out.push(UiEvent::TextDelta { id, delta: text });
            }

            UpstreamEvent::Data { items } => {
                self.close_text(out);
                for item in items {
                    self.apply_data_item(item, out);
                }
            }

            UpstreamEvent::Error { message } => {
                self.close_text(out);
                out.push(UiEvent::error(message));
            }

            UpstreamEvent::ToolCallStart {
                tool_call_id,
                tool_name,
            } => {
                self.close_text(out);
                self.announce_tool(&tool_call_id, &tool_name, out);
            }

            UpstreamEvent::ToolCallComplete {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.close_text(out);
                self.announce_tool(&tool_call_id, &tool_name, out);
                out.push(UiEvent::ToolInputAvailable {
                    tool_call_id,
                    tool_name,
                    input: args,
                });
            }

            // Forwarded as-is, text and tool state untouched; a delta for an
            // unannounced id is an upstream ordering artifact, not an error.
            UpstreamEvent::ToolArgDelta {
                tool_call_id,
                args_text_delta,
            } => {
                out.push(UiEvent::ToolInputDelta {
                    tool_call_id,
                    input_text_delta: args_text_delta,
                });
            }

            UpstreamEvent::ToolResult {
                tool_call_id,
                result,
            } => {
                self.close_text(out);
                out.push(UiEvent::ToolOutputAvailable {
                    tool_call_id,
                    output: decode_tool_output(result),
                });
            }

            UpstreamEvent::FinishStep => {
                self.close_text(out);
                out.push(UiEvent::FinishStep);
            }
            UpstreamEvent::StartStep => {
                self.close_text(out);
                out.push(UiEvent::StartStep);
            }

            UpstreamEvent::FinishMessage => {
                self.close_text(out);
                self.emit_finish(out);
            }
        }
    }

    /// Terminal sequence shared by every exit path: close the open text
    /// segment and emit `finish` unless it already went out.
    pub fn finalize(&mut self, out: &mut Vec<UiEvent>) {
        self.close_text(out);
        self.emit_finish(out);
    }

    /// Report a mid-stream failure as one `error` event. The open text
    /// segment is closed first; the caller still runs [`finalize`](Self::finalize).
    pub fn fail(&mut self, message: impl Into<String>, out: &mut Vec<UiEvent>) {
        self.close_text(out);
        out.push(UiEvent::error(message));
    }

    fn close_text(&mut self, out: &mut Vec<UiEvent>) {
        if let Some(id) = self.open_text.take() {
            out.push(UiEvent::TextEnd { id });
        }
    }

    fn emit_finish(&mut self, out: &mut Vec<UiEvent>) {
        if !self.finished {
            self.finished = true;
            out.push(UiEvent::Finish);
        }
    }

    fn announce_tool(&mut self, tool_call_id: &str, tool_name: &str, out: &mut Vec<UiEvent>) {
        if self.tools.contains_key(tool_call_id) {
            return;
        }
        self.tools.insert(
            tool_call_id.to_string(),
            ToolCallRecord {
                tool_name: tool_name.to_string(),
                started: true,
            },
        );
        out.push(UiEvent::ToolInputStart {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
        });
    }

    fn apply_data_item(&mut self, item: Value, out: &mut Vec<UiEvent>) {
        let conversation_id = item
            .get("conversation_id")
            .and_then(id_string);

        if item.get("type").and_then(Value::as_str) == Some("artifact") {
            let id = item
                .get("id")
                .and_then(id_string)
                .unwrap_or_else(|| self.ids.next_id());
            out.push(UiEvent::DataArtifact { id, data: item });
        } else if conversation_id.is_none() {
            debug!("ignoring data item without artifact type or conversation id");
        }

        if let Some(conversation_id) = conversation_id {
            out.push(UiEvent::DataConversation {
                data: ConversationData { conversation_id },
            });
        }
    }
}

/// Ids may arrive as strings or numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tool results are often JSON serialized into a string; recover the
/// structure when possible, otherwise keep the text.
fn decode_tool_output(result: Value) -> Value {
    match result {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> StreamSession {
        StreamSession::with_ids(IdGen::with_prefix("s"))
    }

    fn feed(session: &mut StreamSession, lines: &[&str]) -> Vec<UiEvent> {
        let mut out = Vec::new();
        for line in lines {
            if let Ok(event) = UpstreamEvent::parse_line(line) {
                session.apply(event, &mut out);
            }
        }
        out
    }

    fn text_delta(id: &str, delta: &str) -> UiEvent {
        UiEvent::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    #[test]
    fn text_run_is_bracketed_and_finish_closes_it() {
        let mut s = session();
        let out = feed(&mut s, &[r#"0:"Hello""#, r#"0:" world""#, "d:{}"]);
        assert_eq!(
            out,
            vec![
                UiEvent::TextStart { id: "s-1".into() },
                text_delta("s-1", "Hello"),
                text_delta("s-1", " world"),
                UiEvent::TextEnd { id: "s-1".into() },
                UiEvent::Finish,
            ]
        );
        assert!(s.is_finished());
        assert!(s.open_text.is_none());
    }

    #[test]
    fn empty_text_delta_is_suppressed() {
        let mut s = session();
        let out = feed(&mut s, &[r#"0:"""#]);
        assert!(out.is_empty());
        assert!(s.open_text.is_none());

        let out = feed(&mut s, &[r#"0:"x""#, r#"0:"""#]);
        assert_eq!(
            out,
            vec![UiEvent::TextStart { id: "s-1".into() }, text_delta("s-1", "x")]
        );
    }

    #[test]
    fn data_closes_text_and_new_text_gets_fresh_segment() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[
                r#"0:"a""#,
                r#"2:[{"type":"artifact","id":"art-7","title":"Plan"}]"#,
                r#"0:"b""#,
            ],
        );
        assert_eq!(
            out,
            vec![
                UiEvent::TextStart { id: "s-1".into() },
                text_delta("s-1", "a"),
                UiEvent::TextEnd { id: "s-1".into() },
                UiEvent::DataArtifact {
                    id: "art-7".into(),
                    data: json!({"type":"artifact","id":"art-7","title":"Plan"}),
                },
                UiEvent::TextStart { id: "s-2".into() },
                text_delta("s-2", "b"),
            ]
        );
    }

    #[test]
    fn artifact_without_id_gets_generated_one() {
        let mut s = session();
        let out = feed(&mut s, &[r#"2:{"type":"artifact","title":"Deck"}"#]);
        assert_eq!(
            out,
            vec![UiEvent::DataArtifact {
                id: "s-1".into(),
                data: json!({"type":"artifact","title":"Deck"}),
            }]
        );
    }

    #[test]
    fn conversation_item_emits_data_conversation() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[r#"2:[{"conversation_id":"c-1"},{"type":"other"},{"type":"artifact","id":3,"conversation_id":"c-2"}]"#],
        );
        assert_eq!(
            out,
            vec![
                UiEvent::DataConversation {
                    data: ConversationData {
                        conversation_id: "c-1".into()
                    }
                },
                UiEvent::DataArtifact {
                    id: "3".into(),
                    data: json!({"type":"artifact","id":3,"conversation_id":"c-2"}),
                },
                UiEvent::DataConversation {
                    data: ConversationData {
                        conversation_id: "c-2".into()
                    }
                },
            ]
        );
    }

    #[test]
    fn tool_input_start_announced_once_per_id() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[
                r#"7:{"toolCallId":"t1","toolName":"lookup"}"#,
                r#"8:{"toolCallId":"t1","argsTextDelta":"{\"q\":1}"}"#,
                r#"9:{"toolCallId":"t1","toolName":"lookup","args":{"q":1}}"#,
                r#"9:{"toolCallId":"t1","toolName":"lookup","args":{"q":1}}"#,
            ],
        );
        let starts = out
            .iter()
            .filter(|e| matches!(e, UiEvent::ToolInputStart { .. }))
            .count();
        let available = out
            .iter()
            .filter(|e| matches!(e, UiEvent::ToolInputAvailable { .. }))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(available, 2);
        assert_eq!(out[0].kind(), "tool-input-start");
        assert_eq!(out[1].kind(), "tool-input-delta");
        assert_eq!(
            s.tools.get("t1"),
            Some(&ToolCallRecord {
                tool_name: "lookup".into(),
                started: true
            })
        );
    }

    #[test]
    fn complete_tool_call_then_string_result_is_parsed() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[
                r#"9:{"toolCallId":"t1","toolName":"lookup","args":{}}"#,
                r#"a:{"toolCallId":"t1","result":"{\"x\":1}"}"#,
            ],
        );
        assert_eq!(
            out,
            vec![
                UiEvent::ToolInputStart {
                    tool_call_id: "t1".into(),
                    tool_name: "lookup".into()
                },
                UiEvent::ToolInputAvailable {
                    tool_call_id: "t1".into(),
                    tool_name: "lookup".into(),
                    input: json!({})
                },
                UiEvent::ToolOutputAvailable {
                    tool_call_id: "t1".into(),
                    output: json!({"x": 1})
                },
            ]
        );
    }

    #[test]
    fn non_json_string_result_is_kept_as_text() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[r#"a:{"toolCallId":"t2","result":"plain words"}"#],
        );
        assert_eq!(
            out,
            vec![UiEvent::ToolOutputAvailable {
                tool_call_id: "t2".into(),
                output: json!("plain words")
            }]
        );
    }

    #[test]
    fn arg_delta_does_not_touch_text_or_tools() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[
                r#"0:"thinking""#,
                r#"8:{"toolCallId":"t9","argsTextDelta":"{"}"#,
            ],
        );
        assert_eq!(out.last().map(UiEvent::kind), Some("tool-input-delta"));
        assert!(s.open_text.is_some());
        assert!(s.tools.get("t9").is_none());
    }

    #[test]
    fn tool_events_close_open_text_first() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[
                r#"0:"let me check""#,
                r#"7:{"toolCallId":"t1","toolName":"lookup"}"#,
            ],
        );
        let kinds: Vec<_> = out.iter().map(UiEvent::kind).collect();
        assert_eq!(
            kinds,
            ["text-start", "text-delta", "text-end", "tool-input-start"]
        );
    }

    #[test]
    fn upstream_error_does_not_finish() {
        let mut s = session();
        let out = feed(&mut s, &[r#"3:{"message":"quota exceeded"}"#]);
        assert_eq!(out, vec![UiEvent::error("quota exceeded")]);
        assert!(!s.is_finished());
    }

    #[test]
    fn error_and_step_events_split_text_runs() {
        let mut s = session();
        let out = feed(
            &mut s,
            &[r#"0:"hi""#, r#"3:"oops""#, "e:{}", "f:{}", r#"0:"more""#, "d:{}"],
        );
        assert_eq!(
            out,
            vec![
                UiEvent::TextStart { id: "s-1".into() },
                text_delta("s-1", "hi"),
                UiEvent::TextEnd { id: "s-1".into() },
                UiEvent::error("oops"),
                UiEvent::FinishStep,
                UiEvent::StartStep,
                UiEvent::TextStart { id: "s-2".into() },
                text_delta("s-2", "more"),
                UiEvent::TextEnd { id: "s-2".into() },
                UiEvent::Finish,
            ]
        );
    }

    #[test]
    fn failure_closes_text_before_error() {
        let mut s = session();
        let mut out = feed(&mut s, &[r#"0:"partial""#]);
        out.clear();
        s.fail("connection reset", &mut out);
        s.finalize(&mut out);
        assert_eq!(
            out,
            vec![
                UiEvent::TextEnd { id: "s-1".into() },
                UiEvent::error("connection reset"),
                UiEvent::Finish,
            ]
        );
    }

    #[test]
    fn blank_conversation_id_is_dropped() {
        let s = session().with_conversation_id(Some("conv-9".into()));
        assert_eq!(s.conversation_id(), Some("conv-9"));

        let s = session().with_conversation_id(Some("  ".into()));
        assert_eq!(s.conversation_id(), None);
        assert_eq!(session().conversation_id(), None);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut s = session();
        let mut out = feed(&mut s, &["d:{}", "d:{}"]);
        s.finalize(&mut out);
        assert_eq!(out, vec![UiEvent::Finish]);
    }

    #[test]
    fn finalize_closes_text_and_finishes() {
        let mut s = session();
        let mut out = feed(&mut s, &[r#"0:"partial""#]);
        out.clear();
        s.finalize(&mut out);
        assert_eq!(
            out,
            vec![UiEvent::TextEnd { id: "s-1".into() }, UiEvent::Finish]
        );
    }

    #[test]
    fn steps_pass_through() {
        let mut s = session();
        let out = feed(&mut s, &[r#"f:{"messageId":"m"}"#, r#"e:{}"#]);
        assert_eq!(out, vec![UiEvent::StartStep, UiEvent::FinishStep]);
    }

    #[test]
    fn id_gen_prefixes_are_random() {
        let mut a = IdGen::random();
        let mut b = IdGen::random();
        assert_ne!(a.next_id(), b.next_id());
        assert!(a.next_id().ends_with("-2"));
    }
}
