use std::{fmt, sync::Arc};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use warden_conversation::ThreadId;

use crate::{
    definition::ToolDefinition,
    error::{Error, Result, ToolError},
};

/// Whether a tool may run without a human confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    /// Read-only or side-effect free, executed as soon as it is requested.
    Auto,

    /// Mutates stored data, only executed after an explicit confirmation.
    Sensitive,
}

/// The context a tool is invoked in.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub thread: ThreadId,
    pub tool_call_id: String,

    /// The shared context fields of the conversation.
    pub shared: IndexMap<String, Value>,
}

/// The executable part of a tool.
#[async_trait]
pub trait ToolHandler: fmt::Debug + Send + Sync {
    /// Execute the tool with validated arguments.
    async fn call(&self, arguments: &Map<String, Value>, ctx: &ToolContext)
    -> std::result::Result<String, ToolError>;

    /// The prompt shown to the user before a sensitive call executes.
    fn confirmation_prompt(&self, name: &str, arguments: &Map<String, Value>) -> String {
        format!(
            "The assistant wants to run `{name}` with arguments {}. Reply `confirm` to run it.",
            Value::Object(arguments.clone())
        )
    }
}

/// A registered tool: its definition, safety class and handler.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    definition: ToolDefinition,
    safety: SafetyClass,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(definition: ToolDefinition, safety: SafetyClass, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition,
            safety,
            handler,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    #[must_use]
    pub const fn safety(&self) -> SafetyClass {
        self.safety
    }

    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.safety == SafetyClass::Sensitive
    }

    #[must_use]
    pub fn confirmation_prompt(&self, arguments: &Map<String, Value>) -> String {
        self.handler.confirmation_prompt(self.name(), arguments)
    }

    /// Validate the arguments and invoke the handler.
    ///
    /// Parameter defaults are applied before validation.
    pub async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError> {
        let mut arguments = arguments.clone();
        self.definition.apply_defaults(&mut arguments);
        self.definition.validate_arguments(&arguments)?;

        info!(
            tool = self.name(),
            thread = %ctx.thread,
            tool_call_id = %ctx.tool_call_id,
            "Calling tool."
        );

        let result = self.handler.call(&arguments, ctx).await;
        debug!(tool = self.name(), ok = result.is_ok(), "Tool call completed.");

        result
    }
}

/// The tools available to the model, keyed by name.
///
/// The registry is built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        let name = descriptor.name().to_owned();
        if self.tools.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }

        debug!(tool = %name, safety = ?descriptor.safety(), "Registered tool.");
        self.tools.insert(name, descriptor);
        Ok(())
    }

    /// Builder variant of [`Self::register`].
    pub fn with(mut self, descriptor: ToolDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Resolve a tool name requested by the model.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor> {
        self.tools
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The definitions of all tools, in registration order.
    #[must_use]
    pub fn list_for_model(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::ToolParameter;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(
            &self,
            arguments: &Map<String, Value>,
            _ctx: &ToolContext,
        ) -> std::result::Result<String, ToolError> {
            Ok(Value::Object(arguments.clone()).to_string())
        }
    }

    fn echo(name: &str, safety: SafetyClass) -> ToolDescriptor {
        ToolDescriptor::new(
            ToolDefinition::new(name)
                .with_parameter("text", ToolParameter::string("Text to echo.").required())
                .with_parameter("tone", ToolParameter::string("Tone.").with_default("plain")),
            safety,
            Arc::new(Echo),
        )
    }

    fn ctx() -> ToolContext {
        ToolContext {
            thread: ThreadId::new("test").unwrap(),
            tool_call_id: "call_1".into(),
            shared: IndexMap::new(),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("echo", SafetyClass::Auto)).unwrap();

        assert_eq!(
            registry.register(echo("echo", SafetyClass::Sensitive)),
            Err(Error::DuplicateTool("echo".into()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("echo").unwrap().safety(), SafetyClass::Auto);
    }

    #[test]
    fn test_resolve_and_list() {
        let registry = ToolRegistry::new()
            .with(echo("b", SafetyClass::Auto))
            .unwrap()
            .with(echo("a", SafetyClass::Sensitive))
            .unwrap();

        assert!(registry.resolve("a").unwrap().is_sensitive());
        assert_matches!(registry.resolve("missing"), Err(Error::NotFound(name)) if name == "missing");

        let names = registry
            .list_for_model()
            .into_iter()
            .map(|def| def.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_invoke_applies_defaults_and_validates() {
        let tool = echo("echo", SafetyClass::Auto);

        let args = Map::from_iter([("text".to_owned(), json!("hi"))]);
        let out = tool.invoke(&args, &ctx()).await.unwrap();
        assert_eq!(out, r#"{"text":"hi","tone":"plain"}"#);

        let args = Map::from_iter([("other".to_owned(), json!(1))]);
        assert_eq!(
            tool.invoke(&args, &ctx()).await,
            Err(ToolError::Arguments {
                missing: vec!["text".into()],
                unknown: vec!["other".into()],
            })
        );
    }

    #[test]
    fn test_default_confirmation_prompt() {
        let tool = echo("echo", SafetyClass::Sensitive);
        let args = Map::from_iter([("text".to_owned(), json!("hi"))]);

        let prompt = tool.confirmation_prompt(&args);
        assert!(prompt.contains("`echo`"));
        assert!(prompt.contains(r#"{"text":"hi"}"#));
    }
}
