//! Bounded retry with attempt-scaled backoff.

use std::future::Future;
use std::time::Duration;

use seatsync_core::EntityKind;
use tracing::warn;

use super::FetchError;

/// Retry budget for a single collection fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt that follows failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `attempt_fn` until it succeeds, fails permanently, or the budget runs out.
///
/// Only errors for which [`FetchError::is_transient`] holds are retried. The
/// closure receives the 1-indexed attempt number.
///
/// # Errors
///
/// Returns the first non-transient error unchanged, or
/// [`FetchError::Exhausted`] wrapping the last transient error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    kind: EntityKind,
    mut attempt_fn: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(FetchError::Exhausted {
                    kind,
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    kind = %kind,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Fetch attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
