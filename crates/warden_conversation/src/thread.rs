//! See [`ThreadId`].

use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The maximum length of a thread identifier.
const MAX_LEN: usize = 128;

/// Identifier of a conversation thread.
///
/// Thread IDs are supplied by the caller (e.g. a chat front-end) and double as
/// storage directory names, so they are restricted to ASCII alphanumerics,
/// `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id: String = id.into();

        if id.is_empty() || id.len() > MAX_LEN {
            return Err(Error::InvalidThreadId(id));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidThreadId(id));
        }

        Ok(Self(id))
    }

    /// Generate a new thread ID based on the current time.
    #[must_use]
    pub fn generate() -> Self {
        let now = Utc::now();
        Self(format!(
            "t{}{:03}",
            now.timestamp(),
            now.timestamp_subsec_millis()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ThreadId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ThreadId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ThreadId> for String {
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
