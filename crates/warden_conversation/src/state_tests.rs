use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::{Map, json};

use super::*;

fn call(id: &str, name: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, Map::new())
}

fn position(state: &ConversationState, f: impl Fn(&Message) -> bool) -> usize {
    state.messages().iter().position(f).unwrap()
}

#[test]
fn test_sanitize_orphaned_tool_calls_injects_directly_after_request() {
    let mut state = ConversationState::new();

    state.add_user_message("Hello");
    state.add_assistant_message("", vec![call("orphan_1", "some_tool")]);
    state.add_assistant_message("trailing", vec![]);

    assert_eq!(state.sanitize_orphaned_tool_calls(), 1);

    let response = state.find_tool_call_response("orphan_1").unwrap();
    assert!(response.is_error());
    assert!(response.content().contains("interrupted"));

    let request_pos = position(&state, |m| {
        m.tool_calls().iter().any(|c| c.id == "orphan_1")
    });
    let response_pos = position(&state, |m| m.tool_call_id() == Some("orphan_1"));
    assert_eq!(response_pos, request_pos + 1);
    assert_eq!(state.last_message().unwrap().content(), "trailing");
}

#[test]
fn test_sanitize_orphaned_tool_calls_leaves_matched_alone() {
    let mut state = ConversationState::new();

    state.add_assistant_message("", vec![call("matched_1", "tool")]);
    state.add_tool_call_response(ToolCallResponse::success("matched_1", "ok"));

    let len_before = state.len();
    assert_eq!(state.sanitize_orphaned_tool_calls(), 0);
    assert_eq!(state.len(), len_before);
    assert!(state.unanswered_tool_calls().is_empty());
}

#[test]
fn test_sanitize_orphaned_tool_calls_handles_partial_set() {
    let mut state = ConversationState::new();

    // Two parallel requests, only 'a' has a response.
    state.add_assistant_message("", vec![call("a", "tool"), call("b", "tool")]);
    state.add_tool_call_response(ToolCallResponse::success("a", "ok"));

    assert_eq!(state.unanswered_tool_calls(), vec![&call("b", "tool")]);
    assert_eq!(state.sanitize_orphaned_tool_calls(), 1);

    assert_eq!(state.find_tool_call_response("a").unwrap().content(), "ok");
    assert!(state.find_tool_call_response("b").unwrap().is_error());
    assert!(state.unanswered_tool_calls().is_empty());

    // Idempotent.
    assert_eq!(state.sanitize_orphaned_tool_calls(), 0);
}

#[test]
fn test_sanitize_orphaned_tool_calls_skips_pending_interrupt() {
    let mut state = ConversationState::new();

    let pending = call("call_sensitive", "createSql");
    state.add_assistant_message("", vec![pending.clone()]);
    state
        .set_pending_interrupt(PendingInterrupt::new(pending, "Confirm?", 1))
        .unwrap();

    assert_eq!(state.sanitize_orphaned_tool_calls(), 0);
    assert!(state.find_tool_call_response("call_sensitive").is_none());
}

#[test]
fn test_pending_interrupt_is_never_overwritten() {
    let mut state = ConversationState::new();

    state
        .set_pending_interrupt(PendingInterrupt::new(call("first", "createSql"), "1", 1))
        .unwrap();

    let result =
        state.set_pending_interrupt(PendingInterrupt::new(call("second", "createSql"), "2", 2));
    assert_eq!(result, Err(Error::InterruptPending {
        tool_call_id: "first".into()
    }));
    assert_eq!(state.pending_interrupt().unwrap().tool_call_id(), "first");

    let taken = state.take_pending_interrupt().unwrap();
    assert_eq!(taken.prompt, "1");
    assert!(!state.has_pending_interrupt());
    assert!(state.take_pending_interrupt().is_none());
}

#[test]
fn test_context_fields() {
    let mut state = ConversationState::new();
    assert!(state.context().is_empty());

    state.set_context_field("themeColor", "#6366f1");
    state.push_context_item("proverbs", "A stitch in time saves nine.");
    state.push_context_item("proverbs", "Measure twice, cut once.");

    assert_eq!(state.context_field("themeColor"), Some(&json!("#6366f1")));
    assert_eq!(
        state.context_field("proverbs"),
        Some(&json!(["A stitch in time saves nine.", "Measure twice, cut once."]))
    );

    state.extend_context([("themeColor".to_owned(), json!("red"))]);
    assert_eq!(state.context_field("themeColor"), Some(&json!("red")));

    // A scalar field is replaced when used as a list.
    state.push_context_item("themeColor", "blue");
    assert_eq!(state.context_field("themeColor"), Some(&json!(["blue"])));
}

#[test]
fn test_state_serialization_roundtrip() {
    let mut state = ConversationState::new();
    state.add_user_message("Add 蔡徐坤 to the Artist table");
    state.add_assistant_message("", vec![call("call_1", "createSql")]);
    state.set_context_field("proverbs", json!([]));
    state
        .set_pending_interrupt(PendingInterrupt::new(call("call_1", "createSql"), "Run?", 1))
        .unwrap();

    let json = serde_json::to_string(&state).unwrap();
    let restored: ConversationState = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, state);
    assert_eq!(restored.pending_interrupt().unwrap().rounds, 1);
}

#[test]
fn test_state_deserializes_without_optional_fields() {
    let state: ConversationState = serde_json::from_value(json!({
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z",
    }))
    .unwrap();

    assert!(state.is_empty());
    assert!(state.context().is_empty());
    assert_matches!(state.pending_interrupt(), None);
}
