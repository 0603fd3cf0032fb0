//! An OpenAI compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use url::Url;
use warden_conversation::{Message, MessageKind, ToolCallRequest};
use warden_tool::ToolDefinition;

use super::{Provider, Reply};
use crate::{
    error::{Error, Result},
    query::ChatQuery,
    retry::{RetryConfig, with_retry},
};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    http_client: reqwest::Client,
    api_key: String,
    base_url: Url,
    model: String,
    retry: RetryConfig,
}

impl OpenAiCompatible {
    pub fn new(
        base_url: Url,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url,
            model: model.into(),
            retry: RetryConfig::default(),
        })
    }

    /// Read the API key from the environment variable `api_key_env`.
    pub fn from_env(
        base_url: Url,
        model: impl Into<String>,
        api_key_env: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = std::env::var(api_key_env).map_err(|error| Error::MissingEnv {
            name: api_key_env.to_owned(),
            error,
        })?;

        Self::new(base_url, model, api_key, timeout)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["chat", "completions"]);

        Ok(url)
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", self.api_key)
                .parse()
                .map_err(|e| Error::Config(format!("Invalid API key header format: {e}")))?,
        );

        Ok(headers)
    }

    async fn send(&self, url: Url, headers: HeaderMap, request: &types::Request) -> Result<Reply> {
        let response = self
            .http_client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                code: status.as_u16(),
                message,
            });
        }

        parse_response(response.json::<types::Response>().await?)
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    async fn chat_completion(&self, query: &ChatQuery) -> Result<Reply> {
        let url = self.endpoint()?;
        let headers = self.build_headers()?;
        let request = build_request(&self.model, query);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request."
        );

        let (url, headers, request) = (&url, &headers, &request);
        with_retry(&self.retry, move || self.send(url.clone(), headers.clone(), request)).await
    }
}

fn build_request(model: &str, query: &ChatQuery) -> types::Request {
    let messages = query.messages.iter().map(convert_message).collect();
    let tools = query.tools.iter().map(convert_tool).collect();

    types::Request {
        model: model.to_owned(),
        messages,
        tools,
    }
}

fn convert_message(message: &Message) -> types::Message {
    match &message.kind {
        MessageKind::System { content } => types::Message::System {
            content: content.clone(),
        },
        MessageKind::User { content } => types::Message::User {
            content: content.clone(),
        },
        MessageKind::Assistant {
            content,
            tool_calls,
        } => types::Message::Assistant {
            content: (!content.is_empty() || tool_calls.is_empty()).then(|| content.clone()),
            tool_calls: tool_calls
                .iter()
                .map(|call| types::ToolCall {
                    id: call.id.clone(),
                    kind: types::FUNCTION.to_owned(),
                    function: types::FunctionCall {
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()).to_string(),
                    },
                })
                .collect(),
        },
        MessageKind::Tool(response) => types::Message::Tool {
            tool_call_id: response.id.clone(),
            content: match &response.result {
                Ok(content) => content.clone(),
                Err(error) => format!("Error: {error}"),
            },
        },
    }
}

fn convert_tool(tool: &ToolDefinition) -> types::Tool {
    types::Tool {
        kind: types::FUNCTION.to_owned(),
        function: types::FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.to_parameters_schema(),
        },
    }
}

fn parse_response(response: types::Response) -> Result<Reply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(Error::EmptyResponse)?;

    trace!(finish_reason = ?choice.finish_reason, "Received chat completion.");

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = parse_arguments(&call.function.name, &call.function.arguments);
            ToolCallRequest::new(call.id, call.function.name, arguments)
        })
        .collect();

    Ok(Reply::new(
        choice.message.content.unwrap_or_default(),
        tool_calls,
    ))
}

/// Parse the JSON-encoded arguments of a tool call.
///
/// Malformed arguments yield an empty object, which then fails argument
/// validation and is reported back to the model.
fn parse_arguments(tool: &str, arguments: &str) -> Map<String, Value> {
    if arguments.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool, arguments = %other, "Tool call arguments are not an object.");
            Map::new()
        }
        Err(error) => {
            warn!(tool, %error, "Malformed tool call arguments.");
            Map::new()
        }
    }
}

mod types {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    pub(super) const FUNCTION: &str = "function";

    #[derive(Debug, Serialize)]
    pub(super) struct Request {
        pub model: String,
        pub messages: Vec<Message>,

        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool>,
    }

    #[derive(Debug, Serialize)]
    #[serde(tag = "role", rename_all = "snake_case")]
    pub(super) enum Message {
        System {
            content: String,
        },
        User {
            content: String,
        },
        Assistant {
            content: Option<String>,

            #[serde(skip_serializing_if = "Vec::is_empty")]
            tool_calls: Vec<ToolCall>,
        },
        Tool {
            tool_call_id: String,
            content: String,
        },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub(super) struct ToolCall {
        pub id: String,

        #[serde(rename = "type", default = "function")]
        pub kind: String,

        pub function: FunctionCall,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub(super) struct FunctionCall {
        pub name: String,

        #[serde(default)]
        pub arguments: String,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct Tool {
        #[serde(rename = "type")]
        pub kind: String,
        pub function: FunctionDefinition,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct FunctionDefinition {
        pub name: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,

        pub parameters: Value,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Response {
        #[serde(default)]
        pub choices: Vec<Choice>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Choice {
        pub message: ResponseMessage,

        #[serde(default)]
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ResponseMessage {
        #[serde(default)]
        pub content: Option<String>,

        #[serde(default)]
        pub tool_calls: Vec<ToolCall>,
    }

    fn function() -> String {
        FUNCTION.to_owned()
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
