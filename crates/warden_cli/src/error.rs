use std::{io, path::PathBuf};

use crate::cmd;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// CLI Error types
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Command error: {0}")]
    Command(#[from] cmd::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] warden_config::Error),

    #[error("Agent error: {0}")]
    Agent(#[from] warden_agent::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] warden_storage::Error),

    #[error("Database error: {0}")]
    Sql(#[from] warden_sql::Error),

    #[error("Tool error: {0}")]
    Tool(#[from] warden_tool::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] warden_llm::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}
