use warden_conversation::ThreadId;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("The limit of {limit} tool calls per turn was exceeded")]
    TurnBudgetExceeded { limit: u32 },

    #[error("Confirmed tool `{tool}` failed: {error}")]
    SensitiveExecutionFailure { tool: String, error: String },

    #[error("Thread {thread} is waiting for a confirmation of tool call {tool_call_id}")]
    ConfirmationPending {
        thread: ThreadId,
        tool_call_id: String,
    },

    #[error("Thread {0} has no pending confirmation")]
    NoPendingConfirmation(ThreadId),

    #[error("Unknown thread: {0}")]
    UnknownThread(ThreadId),

    #[error("Thread {thread} has no unanswered tool call {tool_call_id}")]
    UnknownToolCall {
        thread: ThreadId,
        tool_call_id: String,
    },

    #[error("Model error: {0}")]
    Llm(#[from] warden_llm::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] warden_storage::Error),

    #[error("Conversation error: {0}")]
    Conversation(#[from] warden_conversation::Error),
}

#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }

        // Good enough for testing purposes
        format!("{self:?}") == format!("{other:?}")
    }
}
