//! See [`PendingInterrupt`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ToolCallRequest;

/// The durable marker of a turn suspended on a human confirmation.
///
/// It carries everything needed to continue the turn after a process restart:
/// the exact tool call that was requested, the prompt shown to the user and
/// the number of tool rounds already spent in the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// The sensitive tool call awaiting confirmation.
    pub tool_call: ToolCallRequest,

    /// The prompt to display to the user.
    pub prompt: String,

    /// When the turn was suspended.
    pub created_at: DateTime<Utc>,

    /// Tool rounds used in the turn so far, including the suspended call.
    #[serde(default)]
    pub rounds: u32,
}

impl PendingInterrupt {
    #[must_use]
    pub fn new(tool_call: ToolCallRequest, prompt: impl Into<String>, rounds: u32) -> Self {
        Self {
            tool_call,
            prompt: prompt.into(),
            created_at: Utc::now(),
            rounds,
        }
    }

    #[must_use]
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call.id
    }
}
