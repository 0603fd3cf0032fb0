//! Limits and failure policy of a single user turn.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    assignment::{AssignKeyValue, KvAssignment, missing_key},
    error::Result,
};

/// What happens when a confirmed sensitive tool fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveFailure {
    /// Record the failure as a tool result and let the model continue.
    #[default]
    Report,

    /// Record the failure, then end the turn with an error.
    Abort,
}

impl SensitiveFailure {
    pub const VARIANTS: &'static [&'static str] = &["report", "abort"];
}

impl FromStr for SensitiveFailure {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "report" => Ok(Self::Report),
            "abort" => Ok(Self::Abort),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SensitiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Report => "report",
            Self::Abort => "abort",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurnConfig {
    /// The maximum number of tool invocations in a single user turn.
    pub max_tool_rounds: u32,

    pub sensitive_failure: SensitiveFailure,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            sensitive_failure: SensitiveFailure::default(),
        }
    }
}

impl AssignKeyValue for TurnConfig {
    fn keys() -> &'static [&'static str] {
        &["max_tool_rounds", "sensitive_failure"]
    }

    fn assign(&mut self, kv: KvAssignment) -> Result<()> {
        match kv.key() {
            "max_tool_rounds" => self.max_tool_rounds = kv.try_parse()?,
            "sensitive_failure" => {
                self.sensitive_failure = kv.try_one_of(SensitiveFailure::VARIANTS)?;
            }
            _ => return missing_key(&kv, Self::keys()),
        }

        Ok(())
    }
}
