//! Bounded retry policy
//!
//! A fixed number of attempts separated by a backoff delay. Only transient
//! failures are retried; anything else is returned as soon as it happens.

use crate::error::{Error, Result};
use crate::types::BackoffType;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration for a single logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// How the delay grows between attempts
    pub backoff_type: BackoffType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(10, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Constant delay between a bounded number of attempts
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: backoff,
            max_backoff: backoff,
            backoff_type: BackoffType::Constant,
        }
    }

    /// Set the backoff strategy
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(step + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(step);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion is reported as
    /// [`Error::MaxRetriesExceeded`]; callers that know more about the request
    /// (such as the page cursor) translate it into their own error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        while attempt < self.max_attempts {
            attempt += 1;

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Succeeded on attempt {}/{}", attempt, self.max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt < self.max_attempts {
                        let delay = self.delay_after(attempt);
                        warn!(
                            "Attempt {}/{} failed: {}, retrying in {:?}",
                            attempt, self.max_attempts, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::MaxRetriesExceeded {
            attempts: self.max_attempts,
        })
    }
}
