//! Where conversation state and the SQL database live.

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    assignment::{AssignKeyValue, KvAssignment, missing_key},
    error::Result,
};

/// The application name used for platform data directories.
pub const APPLICATION: &str = "warden";

/// The storage root used when no platform data directory is available.
const FALLBACK_ROOT: &str = ".warden";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// The directory conversation threads are persisted under.
    pub root: Utf8PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl AssignKeyValue for StorageConfig {
    fn keys() -> &'static [&'static str] {
        &["root"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "root" => self.root = kv.try_string()?.into(),
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// The SQLite database file. Defaults to `warden.db` in the storage root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,
}

impl DatabaseConfig {
    /// The configured path, or the default location under `storage_root`.
    #[must_use]
    pub fn path_or_default(&self, storage_root: &Utf8Path) -> Utf8PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| storage_root.join("warden.db"))
    }
}

impl AssignKeyValue for DatabaseConfig {
    fn keys() -> &'static [&'static str] {
        &["path"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "path" => self.path = Some(kv.try_string()?.into()),
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}

fn default_root() -> Utf8PathBuf {
    ProjectDirs::from("", "", APPLICATION)
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf()).ok())
        .unwrap_or_else(|| {
            warn!("No usable data directory found, storing state in `{FALLBACK_ROOT}`.");
            Utf8PathBuf::from(FALLBACK_ROOT)
        })
}
