//! Retry utilities for model requests.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

/// Configuration for request retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,

    /// Base backoff delay in milliseconds.
    pub base_backoff_ms: u64,

    /// Maximum backoff delay in seconds.
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1000,
            max_backoff_secs: 30,
        }
    }
}

/// Run `operation`, retrying it on retryable errors.
///
/// Non-retryable errors are returned immediately. After `max_retries` failed
/// retries the last error is returned.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;

                if !error.is_retryable() || attempt > config.max_retries {
                    warn!(
                        attempt,
                        max = config.max_retries,
                        error = error.to_string(),
                        "Request failed."
                    );
                    return Err(error);
                }

                let delay =
                    exponential_backoff(attempt, config.base_backoff_ms, config.max_backoff_secs);

                debug!(
                    attempt,
                    max = config.max_retries,
                    delay_ms = delay.as_millis(),
                    error = error.to_string(),
                    "Retryable request error, backing off."
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Calculate exponential backoff delay.
///
/// Formula: `min(base * 2^(attempt - 1), max_backoff)`, with `attempt`
/// starting at 1.
#[must_use]
pub fn exponential_backoff(attempt: u32, base_backoff_ms: u64, max_backoff_secs: u64) -> Duration {
    let max_ms = max_backoff_secs.saturating_mul(1000);

    // Cap the exponent to avoid overflow.
    let capped_attempt = attempt.saturating_sub(1).min(20);
    let base_delay = base_backoff_ms.saturating_mul(1u64 << capped_attempt);

    Duration::from_millis(base_delay.min(max_ms))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
