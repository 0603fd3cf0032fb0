//! Settings of the built-in tools.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    assignment::{AssignKeyValue, KvAssignment, missing_key},
    error::Result,
    model::default_url,
};

/// The default weather report service.
pub const DEFAULT_WEATHER_URL: &str = "https://wttr.in";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlConfig {
    /// The row limit appended to read-only queries without one.
    pub default_limit: u32,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

impl AssignKeyValue for SqlConfig {
    fn keys() -> &'static [&'static str] {
        &["default_limit"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "default_limit" => self.default_limit = kv.try_parse()?,
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub base_url: Url,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_url(DEFAULT_WEATHER_URL),
        }
    }
}

impl AssignKeyValue for WeatherConfig {
    fn keys() -> &'static [&'static str] {
        &["base_url"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "base_url" => self.base_url = kv.try_parse()?,
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// A JSON array of documents searched by the operation advice tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<Utf8PathBuf>,

    /// The number of documents returned per search.
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { corpus: None, k: 2 }
    }
}

impl AssignKeyValue for RetrievalConfig {
    fn keys() -> &'static [&'static str] {
        &["corpus", "k"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "corpus" => self.corpus = Some(kv.try_string()?.into()),
            "k" => self.k = kv.try_parse()?,
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}
