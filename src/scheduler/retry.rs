// SPDX-License-Identifier: PMPL-1.0-or-later
//! Retry logic with exponential backoff
//!
//! Used around archive range requests:
//! - Network failures and non-2xx answers are retried
//! - Archive format errors are not
//!
//! Strategy: exponential backoff, capped
//! - Retry 1: initial_backoff
//! - Retry 2: initial_backoff * multiplier
//! - ... up to max_backoff, for at most max_attempts attempts in total

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// Create a retry policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            multiplier: config.multiplier.max(1.0),
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let exp = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let secs = (self.initial_backoff.as_secs_f64() * exp).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Execute a fallible operation with retries.
    ///
    /// # Arguments
    /// * `operation` - Async function to execute
    /// * `is_retryable` - Function to determine if error should be retried
    ///
    /// # Returns
    /// Result of the operation, or last error if all attempts are exhausted
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Operation succeeded on attempt {}", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        debug!("Operation failed with non-retryable error: {}", error);
                        return Err(error);
                    }

                    if attempt >= self.max_attempts {
                        warn!("Operation failed after {} attempts: {}", attempt, error);
                        return Err(error);
                    }

                    let delay = self.backoff_for(attempt);
                    warn!(
                        "Operation failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt, self.max_attempts, error, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Execute with automatic retry on retryable errors of our own type.
    pub async fn execute_auto<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.execute(operation, Error::is_retryable).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
