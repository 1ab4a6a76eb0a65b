// Verify the outbound wire format matches what the chat UI client expects.
// These tests ensure protocol compatibility is never broken.

use relay_protocol::sse;
use relay_protocol::ui::{ConversationData, UiEvent};
use serde_json::json;

fn wire(event: &UiEvent) -> String {
    serde_json::to_string(event).unwrap()
}

#[test]
fn unit_events_carry_only_type() {
    assert_eq!(wire(&UiEvent::Start), r#"{"type":"start"}"#);
    assert_eq!(wire(&UiEvent::StartStep), r#"{"type":"start-step"}"#);
    assert_eq!(wire(&UiEvent::FinishStep), r#"{"type":"finish-step"}"#);
    assert_eq!(wire(&UiEvent::Finish), r#"{"type":"finish"}"#);
}

#[test]
fn text_events_share_segment_id() {
    let json = wire(&UiEvent::TextDelta {
        id: "seg-1".into(),
        delta: "Hello".into(),
    });
    assert!(json.contains(r#""type":"text-delta""#));
    assert!(json.contains(r#""id":"seg-1""#));
    assert!(json.contains(r#""delta":"Hello""#));

    assert_eq!(
        wire(&UiEvent::TextEnd { id: "seg-1".into() }),
        r#"{"type":"text-end","id":"seg-1"}"#
    );
}

#[test]
fn error_uses_error_text_field() {
    let json = wire(&UiEvent::error("upstream exploded"));
    assert_eq!(json, r#"{"type":"error","errorText":"upstream exploded"}"#);
}

#[test]
fn tool_events_use_camel_case_keys() {
    let json = wire(&UiEvent::ToolInputStart {
        tool_call_id: "t1".into(),
        tool_name: "lookup".into(),
    });
    assert!(json.contains(r#""type":"tool-input-start""#));
    assert!(json.contains(r#""toolCallId":"t1""#));
    assert!(json.contains(r#""toolName":"lookup""#));
    // snake_case must never leak onto the wire
    assert!(!json.contains("tool_call_id"));

    let json = wire(&UiEvent::ToolInputDelta {
        tool_call_id: "t1".into(),
        input_text_delta: "{\"q\"".into(),
    });
    assert!(json.contains(r#""inputTextDelta":"{\"q\"""#));

    let json = wire(&UiEvent::ToolInputAvailable {
        tool_call_id: "t1".into(),
        tool_name: "lookup".into(),
        input: json!({"q": "rust"}),
    });
    assert!(json.contains(r#""type":"tool-input-available""#));
    assert!(json.contains(r#""input":{"q":"rust"}"#));

    let json = wire(&UiEvent::ToolOutputAvailable {
        tool_call_id: "t1".into(),
        output: json!({"x": 1}),
    });
    assert_eq!(
        json,
        r#"{"type":"tool-output-available","toolCallId":"t1","output":{"x":1}}"#
    );
}

#[test]
fn data_parts_wrap_payload_in_data() {
    let json = wire(&UiEvent::DataArtifact {
        id: "art-1".into(),
        data: json!({"type": "artifact", "title": "Report"}),
    });
    assert!(json.contains(r#""type":"data-artifact""#));
    assert!(json.contains(r#""id":"art-1""#));
    assert!(json.contains(r#""data":{"#));

    let json = wire(&UiEvent::DataConversation {
        data: ConversationData {
            conversation_id: "c-42".into(),
        },
    });
    assert_eq!(
        json,
        r#"{"type":"data-conversation","data":{"conversationId":"c-42"}}"#
    );
}

#[test]
fn kind_matches_serialized_type() {
    let events = [
        UiEvent::Start,
        UiEvent::TextStart { id: "a".into() },
        UiEvent::TextEnd { id: "a".into() },
        UiEvent::error("x"),
        UiEvent::StartStep,
        UiEvent::FinishStep,
        UiEvent::Finish,
    ];
    for ev in &events {
        let value: serde_json::Value = serde_json::from_str(&wire(ev)).unwrap();
        assert_eq!(value["type"], ev.kind());
    }
}

#[test]
fn events_parse_back_from_wire() {
    let json = r#"{"type":"tool-input-start","toolCallId":"t9","toolName":"search"}"#;
    let ev: UiEvent = serde_json::from_str(json).unwrap();
    assert_eq!(
        ev,
        UiEvent::ToolInputStart {
            tool_call_id: "t9".into(),
            tool_name: "search".into()
        }
    );
}

#[test]
fn sse_frame_format() {
    let frame = sse::encode(&UiEvent::Start).unwrap();
    assert_eq!(frame, "data: {\"type\":\"start\"}\n\n");
    assert_eq!(sse::DONE_FRAME, "data: [DONE]\n\n");
    assert_eq!(sse::CONTENT_TYPE, "text/event-stream; charset=utf-8");
}
