//! Bounded retries with exponential backoff for transient operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy: bounded attempts with exponential backoff between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or attempts are exhausted, sleeping
    /// `base_delay * 2^n` before the n-th retry. Returns the last error
    /// once exhausted.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.attempts => {
                    let backoff = self.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
