//! Everything the host (a chat front-end, the CLI) supplies with a
//! submission.

use indexmap::IndexMap;
use serde_json::Value;
use warden_tool::ToolDefinition;

/// A piece of context the host wants the model to see.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub description: String,
    pub value: String,
}

/// The host side of a submission.
///
/// Host actions are advertised to the model like any other tool, but a turn
/// that requests one ends and hands the call back to the host, which reports
/// the result with
/// [`TurnController::submit_tool_result`](crate::TurnController::submit_tool_result).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostContext {
    /// Actions the host executes itself.
    pub actions: Vec<ToolDefinition>,

    /// Rendered into the system message as `description: value` lines.
    pub context: Vec<ContextEntry>,

    /// Fields merged into the shared state of the conversation.
    pub shared: IndexMap<String, Value>,
}

impl HostContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_action(mut self, action: ToolDefinition) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn with_context(mut self, description: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push(ContextEntry {
            description: description.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_shared(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.shared.insert(key.into(), value.into());
        self
    }

    /// Whether `name` is one of the host actions.
    #[must_use]
    pub fn is_action(&self, name: &str) -> bool {
        self.actions.iter().any(|action| action.name == name)
    }
}
