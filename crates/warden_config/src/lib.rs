//! Configuration for the warden agent.
//!
//! Configuration is resolved in layers, each overriding the previous one:
//!
//! 1. Built-in defaults.
//! 2. A `warden.toml` or `warden.json` file in the working directory, or an
//!    explicit file passed with `--config`.
//! 3. Environment variables (see [`ENV_OVERRIDES`]).
//! 4. `--cfg KEY=VALUE` assignments.

pub mod assignment;
mod error;
pub mod fs;
pub mod model;
pub mod storage;
pub mod tools;
pub mod turn;

use camino::Utf8Path;
pub use error::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    assignment::{AssignKeyValue, KvAssignment, missing_key},
    error::Result,
    fs::{ConfigFile, ConfigLoader, ConfigLoaderError},
    model::ModelConfig,
    storage::{DatabaseConfig, StorageConfig},
    tools::{RetrievalConfig, SqlConfig, WeatherConfig},
    turn::TurnConfig,
};

/// Environment variables that override a configuration key.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("WARDEN_MODEL", "model.name"),
    ("WARDEN_BASE_URL", "model.base_url"),
    ("WARDEN_DATABASE", "database.path"),
    ("WARDEN_STORAGE", "storage.root"),
];

/// The full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub turn: TurnConfig,
    pub sql: SqlConfig,
    pub weather: WeatherConfig,
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load the configuration file.
    ///
    /// With an explicit `path`, the file must exist. Otherwise `directory` is
    /// searched, and the defaults are used if it holds no configuration file.
    pub fn load(path: Option<&Utf8Path>, directory: &Utf8Path) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::read(path)?,
            None => match ConfigLoader::default().load(directory) {
                Ok(file) => file,
                Err(ConfigLoaderError::NotFound { .. }) => {
                    debug!(%directory, "No configuration file found, using defaults.");
                    return Ok(Self::default());
                }
                Err(error) => return Err(error.into()),
            },
        };

        debug!(path = %file.path, format = %file.format, "Loading configuration.");
        file.deserialize()
    }

    /// Apply the [`ENV_OVERRIDES`], reading variables through `var`.
    ///
    /// Empty variables are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        for (name, key) in ENV_OVERRIDES {
            let Some(value) = var(name).filter(|v| !v.is_empty()) else {
                continue;
            };

            trace!(name, key, "Applying environment override.");
            self.assign(KvAssignment::new(*key, value))?;
        }

        Ok(())
    }

    /// Apply `KEY=VALUE` assignments in order.
    pub fn apply_assignments<'a>(
        &mut self,
        assignments: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        for assignment in assignments {
            self.assign(assignment.parse()?)?;
        }

        Ok(())
    }

    /// All assignable keys, fully qualified.
    #[must_use]
    pub fn available_keys() -> Vec<String> {
        fn section<T: AssignKeyValue>(name: &str) -> impl Iterator<Item = String> + '_ {
            T::keys().iter().map(move |key| format!("{name}.{key}"))
        }

        section::<ModelConfig>("model")
            .chain(section::<StorageConfig>("storage"))
            .chain(section::<DatabaseConfig>("database"))
            .chain(section::<TurnConfig>("turn"))
            .chain(section::<SqlConfig>("sql"))
            .chain(section::<WeatherConfig>("weather"))
            .chain(section::<RetrievalConfig>("retrieval"))
            .collect()
    }
}

impl Config {
    fn assign(&mut self, mut kv: KvAssignment) -> Result<()> {
        let result = if kv.p("model") {
            self.model.assign(kv)
        } else if kv.p("storage") {
            self.storage.assign(kv)
        } else if kv.p("database") {
            self.database.assign(kv)
        } else if kv.p("turn") {
            self.turn.assign(kv)
        } else if kv.p("sql") {
            self.sql.assign(kv)
        } else if kv.p("weather") {
            self.weather.assign(kv)
        } else if kv.p("retrieval") {
            self.retrieval.assign(kv)
        } else {
            missing_key(&kv, &[])
        };

        // Sections only know their own keys.
        result.map_err(|error| match error {
            Error::UnknownConfigKey { key, .. } => Error::UnknownConfigKey {
                key,
                available_keys: Self::available_keys(),
            },
            error => error,
        })
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
