use warden_conversation::Message;
use warden_tool::ToolDefinition;

/// A request for the next assistant message.
#[derive(Debug, Clone, Default)]
pub struct ChatQuery {
    /// The full history, starting with the system message.
    pub messages: Vec<Message>,

    /// The tools the model may call, registry tools and host actions alike.
    pub tools: Vec<ToolDefinition>,
}

impl ChatQuery {
    #[must_use]
    pub const fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self { messages, tools }
    }

    /// The content of the last user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(Message::content)
    }
}
