//! See [`Message`] and [`MessageKind`].

mod tool_call;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::tool_call::{ToolCallRequest, ToolCallResponse};

/// The role of the author of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
///
/// Messages are immutable once created; new turns append to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The time the message was created.
    pub timestamp: DateTime<Utc>,

    /// The kind of message.
    #[serde(flatten)]
    pub kind: MessageKind,
}

/// The content of a [`Message`], tagged by its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageKind {
    /// Instructions and context for the assistant.
    System { content: String },

    /// A message from the user.
    User { content: String },

    /// A reply from the assistant.
    ///
    /// The `content` can be empty when the assistant only requests tool calls.
    Assistant {
        #[serde(default)]
        content: String,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },

    /// The result of a tool call requested by the assistant.
    Tool(ToolCallResponse),
}

impl Message {
    /// Create a new message with the given timestamp and kind.
    #[must_use]
    pub fn new(kind: MessageKind, timestamp: impl Into<DateTime<Utc>>) -> Self {
        Self {
            timestamp: timestamp.into(),
            kind,
        }
    }

    /// Create a new message with the current timestamp.
    #[must_use]
    pub fn now(kind: MessageKind) -> Self {
        Self::new(kind, Utc::now())
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::now(MessageKind::System {
            content: content.into(),
        })
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::now(MessageKind::User {
            content: content.into(),
        })
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::now(MessageKind::Assistant {
            content: content.into(),
            tool_calls,
        })
    }

    #[must_use]
    pub fn tool(response: ToolCallResponse) -> Self {
        Self::now(MessageKind::Tool(response))
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        match self.kind {
            MessageKind::System { .. } => Role::System,
            MessageKind::User { .. } => Role::User,
            MessageKind::Assistant { .. } => Role::Assistant,
            MessageKind::Tool(_) => Role::Tool,
        }
    }

    /// Returns the text content of the message, which may be empty.
    #[must_use]
    pub fn content(&self) -> &str {
        match &self.kind {
            MessageKind::System { content }
            | MessageKind::User { content }
            | MessageKind::Assistant { content, .. } => content,
            MessageKind::Tool(response) => response.content(),
        }
    }

    /// Returns the tool calls requested by an assistant message.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.kind {
            MessageKind::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Returns the ID of the tool call a tool message responds to.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&str> {
        self.as_tool_call_response().map(|r| r.id.as_str())
    }

    /// Returns a reference to the [`ToolCallResponse`], if applicable.
    #[must_use]
    pub const fn as_tool_call_response(&self) -> Option<&ToolCallResponse> {
        match &self.kind {
            MessageKind::Tool(response) => Some(response),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self.kind, MessageKind::User { .. })
    }

    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self.kind, MessageKind::Assistant { .. })
    }
}

impl From<ToolCallResponse> for Message {
    fn from(response: ToolCallResponse) -> Self {
        Self::tool(response)
    }
}
