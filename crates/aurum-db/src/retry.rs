//! # Retry Loop
//!
//! Re-runs a whole unit of work when it lost a race.
//!
//! ```text
//! attempt 1 ──► StaleWrite ──► sleep ~10ms
//! attempt 2 ──► Busy       ──► sleep ~20ms
//! attempt 3 ──► Ok ✓
//!
//! attempt N ──► StaleWrite ──► ConcurrencyConflict (N = max_attempts)
//! ```
//!
//! Each attempt must open its own transaction; a failed attempt has already
//! rolled back by the time it is retried.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{LedgerError, LedgerResult};

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Runs `f` once, no retries.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `f` until it succeeds, fails for good, or attempts run out.
    ///
    /// Only [`LedgerError::is_retryable`] errors are retried. Exhaustion
    /// becomes [`LedgerError::ConcurrencyConflict`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempt >= self.max_attempts {
                        error!(operation, attempts = attempt, error = %e, "Giving up after repeated conflicts");
                        return Err(LedgerError::ConcurrencyConflict {
                            operation: operation.to_string(),
                            attempts: attempt,
                        });
                    }

                    let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(operation, attempt, ?delay, error = %e, "Retrying after conflict");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
