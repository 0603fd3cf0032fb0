use camino::Utf8PathBuf;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config loader error: {0}")]
    Loader(#[from] crate::fs::ConfigLoaderError),

    #[error("Unable to parse {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },

    #[error("Invalid assignment `{0}`, expected `KEY=VALUE`")]
    InvalidAssignment(String),

    #[error("Unknown config key: {key}\n\nAvailable keys:\n  - {}", available_keys.join("\n  - "))]
    UnknownConfigKey {
        key: String,
        available_keys: Vec<String>,
    },

    #[error("Invalid config value \"{value}\" for key {key}. Expected one of: {}", need.join(", "))]
    InvalidConfigValue {
        key: String,
        value: String,
        need: Vec<String>,
    },

    #[error("Invalid value \"{value}\" for key {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }

        // Good enough for testing purposes
        format!("{self:?}") == format!("{other:?}")
    }
}
