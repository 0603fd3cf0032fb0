use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::{
    SafetyClass, ToolContext, ToolDefinition, ToolDescriptor, ToolHandler, ToolParameter,
    definition::{optional_str, required_str},
    error::ToolError,
};

pub const WEATHER: &str = "getWeather";

/// Real-time weather lookup against a wttr.in compatible service.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: Url,
}

impl WeatherTool {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(WEATHER)
            .with_description(
                "Get the real-time weather information for a given location using an external API.",
            )
            .with_parameter(
                "location",
                ToolParameter::string("The location to get weather for (e.g., 'London', 'Beijing')")
                    .required(),
            )
            .with_parameter(
                "date",
                ToolParameter::string(
                    "The date is currently ignored as this tool returns real-time current weather.",
                ),
            )
    }

    #[must_use]
    pub fn into_descriptor(self) -> ToolDescriptor {
        ToolDescriptor::new(Self::definition(), SafetyClass::Auto, Arc::new(self))
    }

    /// The report URL for a location: `{base}/{location}?format=j1`.
    pub fn report_url(&self, location: &str) -> Result<Url, ToolError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ToolError::Execution(format!("Invalid weather service URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(location);
        url.set_query(Some("format=j1"));

        Ok(url)
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: &Map<String, Value>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let location = required_str(arguments, "location")?;
        let date = optional_str(arguments, "date")?;

        let url = self.report_url(location)?;
        debug!(%url, "Fetching weather report.");

        let report = async {
            self.client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        }
        .await
        .map_err(|error| {
            warn!(%error, location, "Failed to fetch weather.");
            ToolError::Execution(format!("Failed to fetch real weather data: {error}"))
        })?;

        parse_report(location, date, &report).map(|v| v.to_string())
    }
}

/// Extract the current conditions from a wttr.in `format=j1` report.
pub fn parse_report(location: &str, date: Option<&str>, report: &Value) -> Result<Value, ToolError> {
    let current = report
        .pointer("/current_condition/0")
        .ok_or_else(|| ToolError::Execution("Weather report has no current conditions.".into()))?;

    let number = |key: &str| current.get(key).and_then(as_number);
    let conditions = current
        .pointer("/weatherDesc/0/value")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(json!({
        "location": location,
        "date": date.unwrap_or("now"),
        "temperature": number("temp_F"),
        "temperature_c": number("temp_C"),
        "temperature_f": number("temp_F"),
        "conditions": conditions,
        "humidity": number("humidity"),
        "wind_speed_kmph": number("windspeedKmph"),
        "feels_like_c": number("FeelsLikeC"),
        "uv_index": number("uvIndex").unwrap_or(0.0),
        "source": "wttr.in (Real-time)",
    }))
}

/// wttr.in reports numbers as strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
