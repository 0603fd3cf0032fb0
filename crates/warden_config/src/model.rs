//! Model provider configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    assignment::{AssignKeyValue, KvAssignment, missing_key},
    error::Result,
};

/// The default OpenAI-compatible API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// The default model name.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// The environment variable holding the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// The base URL of the chat completions API.
    pub base_url: Url,

    /// The model to request completions from.
    pub name: String,

    /// The environment variable the API key is read from.
    pub api_key_env: String,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,

    /// How often a retryable request failure is retried.
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_url(DEFAULT_BASE_URL),
            name: DEFAULT_MODEL.to_owned(),
            api_key_env: DEFAULT_API_KEY_ENV.to_owned(),
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl AssignKeyValue for ModelConfig {
    fn keys() -> &'static [&'static str] {
        &["base_url", "name", "api_key_env", "timeout_secs", "max_retries"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "base_url" => self.base_url = kv.try_parse()?,
            "name" => self.name = kv.try_string()?,
            "api_key_env" => self.api_key_env = kv.try_string()?,
            "timeout_secs" => self.timeout_secs = kv.try_parse()?,
            "max_retries" => self.max_retries = kv.try_parse()?,
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}

/// Parse one of the built-in default URLs.
pub(crate) fn default_url(url: &'static str) -> Url {
    match Url::parse(url) {
        Ok(url) => url,
        // Only called with the constants in this crate, see `test_default_urls`.
        Err(error) => panic!("invalid default URL `{url}`: {error}"),
    }
}
