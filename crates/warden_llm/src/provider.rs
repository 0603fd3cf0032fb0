pub mod openai;

use async_trait::async_trait;
use warden_conversation::ToolCallRequest;

use crate::{error::Result, query::ChatQuery};

/// The assistant message returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// The text content, possibly empty when tools are requested.
    pub content: String,

    /// The tool calls requested by the model, in order.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Reply {
    #[must_use]
    pub fn new(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    /// A plain message without tool calls.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, vec![])
    }

    /// A reply requesting a single tool call.
    #[must_use]
    pub fn tool_call(call: ToolCallRequest) -> Self {
        Self::new("", vec![call])
    }
}

#[async_trait]
pub trait Provider: std::fmt::Debug + Send + Sync {
    /// Perform a non-streaming chat completion.
    async fn chat_completion(&self, query: &ChatQuery) -> Result<Reply>;
}
