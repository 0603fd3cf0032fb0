use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ToolError;

/// The definition of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub parameters: IndexMap<String, ToolParameter>,
}

impl ToolDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, parameter: ToolParameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    /// Return a map of parameter names to JSON schemas.
    #[must_use]
    pub fn to_parameters_map(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json_schema()))
            .collect::<Map<_, _>>()
    }

    /// Return a JSON schema for the parameters of the tool.
    #[must_use]
    pub fn to_parameters_schema(&self) -> Value {
        let required = self
            .parameters
            .iter()
            .filter(|(_, param)| param.required)
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>();

        serde_json::json!({
            "type": "object",
            "properties": self.to_parameters_map(),
            "additionalProperties": false,
            "required": required,
        })
    }

    /// Fill in missing arguments that have a default value.
    pub fn apply_defaults(&self, arguments: &mut Map<String, Value>) {
        for (name, param) in &self.parameters {
            if arguments.contains_key(name) {
                continue;
            }

            if let Some(default) = &param.default {
                arguments.insert(name.clone(), default.clone());
            }
        }
    }

    /// Check the arguments against the declared parameters.
    ///
    /// Reports missing required parameters and unknown parameters together,
    /// then values outside a parameter's enumeration.
    pub fn validate_arguments(&self, arguments: &Map<String, Value>) -> Result<(), ToolError> {
        let unknown = arguments
            .keys()
            .filter(|k| !self.parameters.contains_key(*k))
            .cloned()
            .collect::<Vec<_>>();

        let mut missing = vec![];
        for (name, param) in &self.parameters {
            if param.required && !arguments.contains_key(name) {
                missing.push(name.to_owned());
            }
        }

        if !missing.is_empty() || !unknown.is_empty() {
            return Err(ToolError::Arguments { missing, unknown });
        }

        for (name, param) in &self.parameters {
            let Some(value) = arguments.get(name) else {
                continue;
            };

            if !param.enumeration.is_empty() && !param.enumeration.contains(value) {
                return Err(ToolError::invalid_argument(
                    name,
                    format!("must be one of {}", Value::from(param.enumeration.clone())),
                ));
            }
        }

        Ok(())
    }
}

/// A single parameter of a [`ToolDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// The JSON type of the parameter.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The allowed values, if restricted.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<Value>,
}

impl ToolParameter {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            default: None,
            required: false,
            description: None,
            enumeration: vec![],
        }
    }

    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self::new("string").with_description(description)
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_enumeration(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    /// Convert the parameter to a JSON schema.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_owned(), self.kind.clone().into());

        if let Some(description) = self.description.as_deref() {
            map.insert("description".to_owned(), description.into());
        }

        if let Some(default) = self.default.clone() {
            map.insert("default".to_owned(), default);
        }

        if !self.enumeration.is_empty() {
            if self.kind != "string" && self.enumeration.iter().any(Value::is_string) {
                warn!(kind = %self.kind, "String enumeration for non-string parameter.");
            }

            map.insert("enum".to_owned(), self.enumeration.as_slice().into());
        }

        Value::Object(map)
    }
}

/// Returns a required string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, ToolError> {
    match arguments.get(name) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        Some(Value::String(_)) => Err(ToolError::invalid_argument(name, "must not be empty")),
        Some(_) => Err(ToolError::invalid_argument(name, "must be a string")),
        None => Err(ToolError::Arguments {
            missing: vec![name.to_owned()],
            unknown: vec![],
        }),
    }
}

/// Returns an optional string argument.
pub(crate) fn optional_str<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(ToolError::invalid_argument(name, "must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn param(kind: &str, required: bool) -> ToolParameter {
        ToolParameter {
            required,
            ..ToolParameter::new(kind)
        }
    }

    fn definition(parameters: impl IntoIterator<Item = (&'static str, ToolParameter)>) -> ToolDefinition {
        parameters
            .into_iter()
            .fold(ToolDefinition::new("test"), |def, (name, param)| {
                def.with_parameter(name, param)
            })
    }

    #[test]
    fn test_validate_arguments() {
        struct TestCase {
            arguments: Map<String, Value>,
            parameters: Vec<(&'static str, ToolParameter)>,
            want: Result<(), ToolError>,
        }

        let cases = vec![
            ("empty", TestCase {
                arguments: Map::new(),
                parameters: vec![],
                want: Ok(()),
            }),
            ("correct", TestCase {
                arguments: Map::from_iter([("foo".to_owned(), json!("bar"))]),
                parameters: vec![("foo", param("string", true)), ("bar", param("string", false))],
                want: Ok(()),
            }),
            ("missing", TestCase {
                arguments: Map::new(),
                parameters: vec![("foo", param("string", true))],
                want: Err(ToolError::Arguments {
                    missing: vec!["foo".to_owned()],
                    unknown: vec![],
                }),
            }),
            ("unknown", TestCase {
                arguments: Map::from_iter([("foo".to_owned(), json!("bar"))]),
                parameters: vec![("bar", param("string", false))],
                want: Err(ToolError::Arguments {
                    missing: vec![],
                    unknown: vec!["foo".to_owned()],
                }),
            }),
            ("both", TestCase {
                arguments: Map::from_iter([("foo".to_owned(), json!("bar"))]),
                parameters: vec![("bar", param("string", true))],
                want: Err(ToolError::Arguments {
                    missing: vec!["bar".to_owned()],
                    unknown: vec!["foo".to_owned()],
                }),
            }),
            ("enumeration", TestCase {
                arguments: Map::from_iter([("unit".to_owned(), json!("kelvin"))]),
                parameters: vec![(
                    "unit",
                    param("string", true).with_enumeration(["celsius", "fahrenheit"]),
                )],
                want: Err(ToolError::InvalidArgument {
                    name: "unit".to_owned(),
                    reason: r#"must be one of ["celsius","fahrenheit"]"#.to_owned(),
                }),
            }),
        ];

        for (name, test_case) in cases {
            let result = definition(test_case.parameters).validate_arguments(&test_case.arguments);
            assert_eq!(result, test_case.want, "failed case: {name}");
        }
    }

    #[test]
    fn test_apply_defaults_fills_missing_values_only() {
        let def = definition([
            ("location", param("string", true)),
            ("date", param("string", false).with_default("now")),
        ]);

        let mut args = Map::from_iter([("location".to_owned(), json!("Beijing"))]);
        def.apply_defaults(&mut args);
        assert_eq!(args.get("date"), Some(&json!("now")));

        let mut args = Map::from_iter([("date".to_owned(), json!("tomorrow"))]);
        def.apply_defaults(&mut args);
        assert_eq!(args.get("date"), Some(&json!("tomorrow")));
        assert_eq!(args.get("location"), None);
    }

    #[test]
    fn test_parameters_schema() {
        let def = ToolDefinition::new("getWeather")
            .with_description("Get the weather.")
            .with_parameter(
                "location",
                ToolParameter::string("The location to get weather for.").required(),
            )
            .with_parameter("date", ToolParameter::string("Ignored."));

        assert_eq!(
            def.to_parameters_schema(),
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The location to get weather for.",
                    },
                    "date": {
                        "type": "string",
                        "description": "Ignored.",
                    },
                },
                "additionalProperties": false,
                "required": ["location"],
            })
        );
    }

    #[test]
    fn test_argument_helpers() {
        let args = Map::from_iter([
            ("query".to_owned(), json!("SELECT 1")),
            ("blank".to_owned(), json!("  ")),
            ("number".to_owned(), json!(1)),
        ]);

        assert_eq!(required_str(&args, "query").unwrap(), "SELECT 1");
        assert!(matches!(
            required_str(&args, "blank"),
            Err(ToolError::InvalidArgument { .. })
        ));
        assert!(matches!(
            required_str(&args, "missing"),
            Err(ToolError::Arguments { .. })
        ));
        assert_eq!(optional_str(&args, "missing").unwrap(), None);
        assert!(optional_str(&args, "number").is_err());
    }
}
