//! See [`ConversationState`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    interrupt::PendingInterrupt,
    message::{Message, MessageKind, ToolCallRequest, ToolCallResponse},
};

/// The content of the synthetic response injected for orphaned tool calls.
const INTERRUPTED_TOOL_CALL: &str =
    "Tool call was interrupted before a result was recorded. It did not run to completion.";

/// The mutable record of one conversation thread.
///
/// A state owns the ordered message history, a map of shared context fields
/// (arbitrary JSON values, for example an accumulated list of facts), and an
/// optional [`PendingInterrupt`]. At most one interrupt can be pending at any
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// When the conversation was started.
    pub created_at: DateTime<Utc>,

    /// When the state was last modified.
    pub updated_at: DateTime<Utc>,

    /// The messages, in order.
    #[serde(default)]
    messages: Vec<Message>,

    /// Shared context fields.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    context: IndexMap<String, Value>,

    /// The turn is suspended, awaiting a confirmation.
    #[serde(default)]
    pending_interrupt: Option<PendingInterrupt>,
}

impl Default for ConversationState {
    fn default() -> Self {
        let now = Utc::now();

        Self {
            created_at: now,
            updated_at: now,
            messages: vec![],
            context: IndexMap::new(),
            pending_interrupt: None,
        }
    }
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages in the conversation, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Push a message onto the history.
    pub fn push(&mut self, message: impl Into<Message>) {
        self.messages.push(message.into());
        self.touch();
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn add_assistant_message(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) {
        self.push(Message::assistant(content, tool_calls));
    }

    pub fn add_tool_call_response(&mut self, response: ToolCallResponse) {
        self.push(Message::tool(response));
    }

    /// Find the tool call request with the given ID.
    #[must_use]
    pub fn find_tool_call_request(&self, id: &str) -> Option<&ToolCallRequest> {
        self.messages
            .iter()
            .flat_map(Message::tool_calls)
            .find(|call| call.id == id)
    }

    /// Find the response to the tool call with the given ID.
    #[must_use]
    pub fn find_tool_call_response(&self, id: &str) -> Option<&ToolCallResponse> {
        self.messages
            .iter()
            .filter_map(Message::as_tool_call_response)
            .find(|response| response.id == id)
    }

    /// Tool calls requested by the assistant that have no response yet.
    #[must_use]
    pub fn unanswered_tool_calls(&self) -> Vec<&ToolCallRequest> {
        let answered = self.answered_ids();

        self.messages
            .iter()
            .flat_map(Message::tool_calls)
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    /// Inject a synthetic error response for every tool call that has no
    /// response.
    ///
    /// The responses are inserted directly after the assistant message that
    /// requested them, so the history never presents a tool call without its
    /// result to the model. Tool calls that are part of the pending interrupt
    /// are left alone, they are resolved by the confirmation.
    ///
    /// Returns the number of injected responses.
    pub fn sanitize_orphaned_tool_calls(&mut self) -> usize {
        let mut answered = self.answered_ids();
        if let Some(pending) = &self.pending_interrupt {
            answered.insert(pending.tool_call.id.clone());
        }

        let mut injected = 0;
        let mut index = 0;
        while index < self.messages.len() {
            let orphans = self.messages[index]
                .tool_calls()
                .iter()
                .filter(|call| !answered.contains(call.id.as_str()))
                .map(|call| call.id.clone())
                .collect::<Vec<_>>();

            index += 1;
            for id in orphans {
                warn!(tool_call_id = %id, "Injecting response for orphaned tool call.");

                let response = Message::tool(ToolCallResponse::error(&id, INTERRUPTED_TOOL_CALL));
                self.messages.insert(index, response);
                answered.insert(id);
                index += 1;
                injected += 1;
            }
        }

        if injected > 0 {
            self.touch();
        }

        injected
    }

    /// Returns the shared context fields.
    #[must_use]
    pub fn context(&self) -> &IndexMap<String, Value> {
        &self.context
    }

    /// Returns a shared context field.
    #[must_use]
    pub fn context_field(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// Set a shared context field, replacing any existing value.
    pub fn set_context_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
        self.touch();
    }

    /// Merge the given fields into the shared context.
    pub fn extend_context(&mut self, fields: impl IntoIterator<Item = (String, Value)>) {
        let mut changed = false;
        for (key, value) in fields {
            self.context.insert(key, value);
            changed = true;
        }

        if changed {
            self.touch();
        }
    }

    /// Append a value to a list-valued context field, creating the list if
    /// needed.
    ///
    /// A non-list value stored under `key` is replaced by a new list.
    pub fn push_context_item(&mut self, key: impl Into<String>, item: impl Into<Value>) {
        let entry = self
            .context
            .entry(key.into())
            .or_insert_with(|| Value::Array(vec![]));

        match entry {
            Value::Array(items) => items.push(item.into()),
            other => {
                debug!(previous = %other, "Replacing non-list context field with a list.");
                *other = Value::Array(vec![item.into()]);
            }
        }

        self.touch();
    }

    /// Returns the pending interrupt, if the turn is suspended.
    #[must_use]
    pub const fn pending_interrupt(&self) -> Option<&PendingInterrupt> {
        self.pending_interrupt.as_ref()
    }

    #[must_use]
    pub const fn has_pending_interrupt(&self) -> bool {
        self.pending_interrupt.is_some()
    }

    /// Mark the conversation as suspended on the given interrupt.
    ///
    /// Fails with [`Error::InterruptPending`] if another interrupt is still
    /// outstanding; the existing interrupt is never overwritten.
    pub fn set_pending_interrupt(&mut self, interrupt: PendingInterrupt) -> Result<()> {
        if let Some(pending) = &self.pending_interrupt {
            return Err(Error::InterruptPending {
                tool_call_id: pending.tool_call_id().to_owned(),
            });
        }

        self.pending_interrupt = Some(interrupt);
        self.touch();
        Ok(())
    }

    /// Remove and return the pending interrupt.
    pub fn take_pending_interrupt(&mut self) -> Option<PendingInterrupt> {
        let interrupt = self.pending_interrupt.take();
        if interrupt.is_some() {
            self.touch();
        }

        interrupt
    }

    fn answered_ids(&self) -> HashSet<String> {
        self.messages
            .iter()
            .filter_map(|m| match &m.kind {
                MessageKind::Tool(response) => Some(response.id.clone()),
                _ => None,
            })
            .collect()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
