pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or querying the registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("Tool `{0}` not found")]
    NotFound(String),

    #[error("Unable to load documents from {path}: {error}")]
    Corpus {
        path: String,
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors raised while executing a tool.
///
/// These are recoverable: the turn controller reports them to the model as
/// the tool call result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: missing {missing:?}, unknown {unknown:?}")]
    Arguments {
        missing: Vec<String>,
        unknown: Vec<String>,
    },

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Statement rejected: {0}")]
    Rejected(#[from] warden_sql::RejectedStatement),

    #[error("Database error: {0}")]
    Database(#[from] warden_sql::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
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

#[cfg(test)]
impl PartialEq for ToolError {
    fn eq(&self, other: &Self) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }

        format!("{self:?}") == format!("{other:?}")
    }
}
