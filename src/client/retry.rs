//! Retry with exponential backoff for top-level claim attempts.
//!
//! Only errors the predicate accepts are retried. Backoff doubles per attempt
//! from `base_backoff`, capped at `max_backoff`.

use crate::error::ProtocolError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retries after the first attempt, by default.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's retries run out.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retries = 0;

    loop {
        match operation(retries + 1).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || retries >= policy.max_retries {
                    return Err(err);
                }

                let backoff = policy.backoff(retries);
                warn!(
                    attempt = retries + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "attempt failed, retrying: {}",
                    err
                );

                sleep(backoff).await;
                retries += 1;
            }
        }
    }
}

/// Only network errors are worth another attempt.
pub fn is_protocol_error_retryable(err: &ProtocolError) -> bool {
    err.is_retryable()
}
