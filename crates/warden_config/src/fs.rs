use std::{fmt, io};

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// The file stem of the configuration file.
pub const CONFIG_FILE_STEM: &str = "warden";

/// The supported configuration file extensions, in order of precedence.
pub const CONFIG_FILE_EXTENSIONS: &[&str] = &["toml", "json"];

/// A configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoaderError {
    #[error("Path is not a directory: {got}")]
    PathIsNotADirectory { got: Utf8PathBuf },

    #[error("Unsupported config file extension: {path}")]
    UnsupportedFormat { path: Utf8PathBuf },

    #[error(
        "No config file named `{stem}` with any of the extensions [{}] found in {path}",
        extensions.join(", ")
    )]
    NotFound {
        path: Utf8PathBuf,
        stem: String,
        extensions: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A configuration file read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: Utf8PathBuf,
    pub format: Format,
    pub content: String,
}

impl ConfigFile {
    /// Read the file at `path`, deriving the format from its extension.
    pub fn read(path: &Utf8Path) -> std::result::Result<Self, ConfigLoaderError> {
        let format = path
            .extension()
            .and_then(Format::from_extension)
            .ok_or_else(|| ConfigLoaderError::UnsupportedFormat {
                path: path.to_owned(),
            })?;

        let content = std::fs::read_to_string(path)?;
        debug!(%path, %format, "Read configuration file.");

        Ok(Self {
            path: path.to_owned(),
            format,
            content,
        })
    }

    /// Deserialize the file content.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let parse_error = |message: String| Error::Parse {
            path: self.path.clone(),
            message,
        };

        match self.format {
            Format::Toml => toml::from_str(&self.content).map_err(|e| parse_error(e.to_string())),
            Format::Json => {
                serde_json::from_str(&self.content).map_err(|e| parse_error(e.to_string()))
            }
        }
    }
}

/// Finds the configuration file in a directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub file_stem: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file_stem: CONFIG_FILE_STEM.to_owned(),
        }
    }
}

impl ConfigLoader {
    /// Load the configuration file from `directory`.
    ///
    /// Extensions are tried in the order of [`CONFIG_FILE_EXTENSIONS`], the
    /// first existing file wins.
    pub fn load<P: AsRef<Utf8Path>>(
        &self,
        directory: P,
    ) -> std::result::Result<ConfigFile, ConfigLoaderError> {
        let directory = directory.as_ref();

        if !directory.is_dir() {
            return Err(ConfigLoaderError::PathIsNotADirectory {
                got: directory.to_path_buf(),
            });
        }

        let mut path = directory.join(&self.file_stem);
        for ext in CONFIG_FILE_EXTENSIONS {
            path.set_extension(ext);
            trace!(%path, "Looking for configuration file.");

            if path.is_file() {
                return ConfigFile::read(&path);
            }
        }

        Err(ConfigLoaderError::NotFound {
            path: directory.to_path_buf(),
            stem: self.file_stem.clone(),
            extensions: CONFIG_FILE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }
}
