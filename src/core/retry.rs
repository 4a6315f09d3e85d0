//! Retry and backoff policy.

use std::time::Duration;

use crate::config::RetryConfig;

/// What to do after a failed or timed-out attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `delay`, then requeue with `retry_count` incremented.
    Retry {
        /// Backoff before the task re-enters the queue.
        delay: Duration,
    },
    /// Retries exhausted; finalize as failed.
    GiveUp,
}

/// Exponential backoff with a cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    backoff_multiplier: f64,
    max_retry_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_retry_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }

    /// Maximum retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `min(retry_delay * multiplier^retry_count, max_retry_delay)`, in whole milliseconds.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let scaled = self.retry_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_retry_delay.as_millis() as f64 {
            return self.max_retry_delay;
        }
        Duration::from_millis(scaled.round() as u64)
    }

    /// Decide the next step for a task that has been retried `retry_count` times.
    #[must_use]
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count < self.max_retries {
            RetryDecision::Retry {
                delay: self.delay_for(retry_count),
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}
