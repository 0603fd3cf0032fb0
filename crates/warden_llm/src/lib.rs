//! The language model service consumed by the turn controller.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod provider;
pub mod query;
pub mod retry;

pub use error::Error;
pub use provider::{Provider, Reply, openai::OpenAiCompatible};
pub use query::ChatQuery;
pub use retry::RetryConfig;
