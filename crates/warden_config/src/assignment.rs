use std::str::FromStr;

use crate::error::{Error, Result};

/// Types whose fields can be set from a `KEY=VALUE` assignment.
pub trait AssignKeyValue {
    /// The keys accepted by [`Self::assign`], relative to this type.
    fn keys() -> &'static [&'static str];

    /// Assign a value to a key of this type.
    fn assign(&mut self, kv: KvAssignment) -> Result<()>;
}

/// A single `KEY=VALUE` assignment, e.g. `turn.max_tool_rounds=4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvAssignment {
    /// The full dotted key, kept for error messages.
    full_key: String,

    /// The part of the key not yet consumed by a parent section.
    key: String,

    value: String,
}

impl KvAssignment {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            full_key: key.clone(),
            key,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn full_key(&self) -> &str {
        &self.full_key
    }

    /// The remaining key, relative to the section being assigned.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consume `segment` from the start of the key.
    ///
    /// Returns `true` if the key started with `segment` followed by a `.`.
    pub fn p(&mut self, segment: &str) -> bool {
        let Some(rest) = self
            .key
            .strip_prefix(segment)
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            return false;
        };

        self.key = rest.to_owned();
        true
    }

    pub fn try_string(self) -> Result<String> {
        if self.value.is_empty() {
            return Err(self.invalid("must not be empty"));
        }

        Ok(self.value)
    }

    pub fn try_parse<T>(self) -> Result<T>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.value
            .trim()
            .parse()
            .map_err(|error: T::Err| self.invalid(error.to_string()))
    }

    /// Parse a value that must be one of `need`.
    pub fn try_one_of<T: FromStr>(self, need: &[&str]) -> Result<T> {
        self.value.parse().map_err(|_| Error::InvalidConfigValue {
            key: self.full_key.clone(),
            value: self.value.clone(),
            need: need.iter().map(ToString::to_string).collect(),
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidValue {
            key: self.full_key.clone(),
            value: self.value.clone(),
            reason: reason.into(),
        }
    }
}

impl FromStr for KvAssignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidAssignment(s.to_owned()))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidAssignment(s.to_owned()));
        }

        Ok(Self::new(key, value))
    }
}

/// The error for a key no section accepts.
pub(crate) fn missing_key(kv: &KvAssignment, available_keys: &[&str]) -> Result<()> {
    Err(Error::UnknownConfigKey {
        key: kv.full_key.clone(),
        available_keys: available_keys.iter().map(ToString::to_string).collect(),
    })
}
