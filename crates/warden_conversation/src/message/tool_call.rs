//! See [`ToolCallRequest`] and [`ToolCallResponse`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A tool call request, emitted by the assistant as part of its reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique identifier for this tool call.
    pub id: String,

    /// Name of the tool to execute.
    pub name: String,

    /// Arguments to pass to the tool.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Creates a new tool call request.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Returns the string value of an argument, if it exists and is a string.
    #[must_use]
    pub fn str_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// The result of executing a tool call.
///
/// This MUST be in response to a [`ToolCallRequest`], with a matching `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResponse {
    /// ID matching the corresponding `ToolCallRequest`.
    pub id: String,

    /// The result of executing the tool: `Ok(content)` on success, `Err(error)`
    /// on failure or rejection.
    pub result: Result<String, String>,
}

impl ToolCallResponse {
    #[must_use]
    pub fn success(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Ok(content.into()),
        }
    }

    #[must_use]
    pub fn error(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Err(error.into()),
        }
    }

    /// Get the content of the response, either the result or the error.
    #[must_use]
    pub fn content(&self) -> &str {
        match &self.result {
            Ok(content) | Err(content) => content,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.result.is_err()
    }
}

// Custom serialization to make it easier to recognize errors.
impl Serialize for ToolCallResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Helper<'a> {
            tool_call_id: &'a str,
            content: &'a str,
            is_error: bool,
        }

        Helper {
            tool_call_id: &self.id,
            content: self.content(),
            is_error: self.is_error(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ToolCallResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            tool_call_id: String,
            content: String,
            #[serde(default)]
            is_error: bool,
        }

        let helper = Helper::deserialize(deserializer)?;

        Ok(Self {
            id: helper.tool_call_id,
            result: if helper.is_error {
                Err(helper.content)
            } else {
                Ok(helper.content)
            },
        })
    }
}
