pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing environment variable {name}: {error}")]
    MissingEnv {
        name: String,
        error: std::env::VarError,
    },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error (status {}): {}", .code, .message)]
    Api { code: u16, message: String },

    #[error("Client config error: {0}")]
    Config(String),

    #[error("The model returned no choices")]
    EmptyResponse,

    #[error("Scripted provider: {0}")]
    Script(String),
}

impl Error {
    /// Whether the request may succeed when sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(error) => error.is_timeout() || error.is_connect(),
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
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
