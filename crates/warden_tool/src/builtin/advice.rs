use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::{
    SafetyClass, ToolContext, ToolDefinition, ToolDescriptor, ToolHandler, ToolParameter,
    definition::required_str,
    error::ToolError,
    retrieval::Retriever,
};

pub const ADVICE: &str = "getOperationAdvice";

/// Operations advice backed by similar documented cases.
#[derive(Debug, Clone)]
pub struct AdviceTool {
    retriever: Arc<dyn Retriever>,
    k: usize,
}

impl AdviceTool {
    #[must_use]
    pub fn new(retriever: Arc<dyn Retriever>, k: usize) -> Self {
        Self { retriever, k }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(ADVICE)
            .with_description(
                "Handle Kubernetes operations questions: find similar documented cases and \
                 suggest the corresponding operations.",
            )
            .with_parameter(
                "query",
                ToolParameter::string("The operations question to find advice for.").required(),
            )
    }

    #[must_use]
    pub fn into_descriptor(self) -> ToolDescriptor {
        ToolDescriptor::new(Self::definition(), SafetyClass::Auto, Arc::new(self))
    }
}

#[async_trait]
impl ToolHandler for AdviceTool {
    async fn call(&self, arguments: &Map<String, Value>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(arguments, "query")?;
        let docs = self.retriever.similarity_search(query, self.k).await?;

        let text = docs
            .iter()
            .map(|doc| {
                format!(
                    "Source: {}\nContent: {}",
                    doc.source().unwrap_or("unknown"),
                    doc.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(json!({ "text": text, "docs": docs }).to_string())
    }
}
