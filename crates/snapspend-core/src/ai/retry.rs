//! Retry with exponential backoff for gateway calls
//!
//! The delay before retry `n` (0 for the first retry) is `base * 2^n`.
//! Rate-limited failures wait at least `rate_limit_floor`. Non-retryable
//! errors surface immediately; running out of attempts wraps the last error
//! in `Error::RetriesExhausted`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::OperationConfig;
use crate::error::{Error, FailureKind, Result};

/// Something that can wait. Tests swap in a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt ceiling and backoff for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_floor: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, rate_limit_floor: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            rate_limit_floor,
        }
    }

    pub fn for_operation(op: &OperationConfig, rate_limit_floor: Duration) -> Self {
        Self::new(op.max_attempts, op.base_delay, rate_limit_floor)
    }

    /// Delay before retry `retry` (0-based) after a failure of `kind`
    pub fn delay_for(&self, retry: u32, kind: FailureKind) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        let delay = self.base_delay.saturating_mul(factor);
        match kind {
            FailureKind::RateLimited => delay.max(self.rate_limit_floor),
            _ => delay,
        }
    }

    /// Run `call` until it succeeds, fails for good, or attempts run out
    pub async fn run<T, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        operation: &str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Gemini call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let kind = err.kind();
                    if kind == FailureKind::NonRetryable {
                        return Err(err);
                    }

                    if attempt >= self.max_attempts {
                        warn!(operation, attempts = attempt, error = %err, "Gemini call gave up");
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    let delay = self.delay_for(attempt - 1, kind);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        kind = ?kind,
                        error = %err,
                        "Gemini call failed, retrying"
                    );
                    sleeper.sleep(delay).await;
                }
            }
        }
    }
}

/// Records requested delays instead of sleeping
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}
