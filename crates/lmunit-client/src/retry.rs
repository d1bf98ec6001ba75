//! Retry budget, backoff schedule and the sleep seam used between attempts.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LmunitError;
use crate::types::ClientConfig;

/// Deterministic exponential backoff: `base_delay * 2^attempt`, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed per request.
    pub max_retries: u32,
    pub base_delay: Duration,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    Retry(Duration),
    /// Stop and report this error for the item.
    GiveUp(LmunitError),
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }

    /// Delay after failed attempt `attempt` (0-indexed). Saturates instead of overflowing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Classify the failure of attempt `attempt` (0-indexed).
    ///
    /// Retryable failures get a backoff unless the budget is spent. A status
    /// failure on the last attempt becomes `RetriesExhausted`; a transport
    /// failure on the last attempt is returned as-is.
    pub fn decide(&self, attempt: u32, error: LmunitError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp(error);
        }

        let is_last = attempt + 1 >= self.max_retries;
        if !is_last {
            return RetryDecision::Retry(self.backoff(attempt));
        }

        if let LmunitError::Status { status, .. } = &error {
            return RetryDecision::GiveUp(LmunitError::RetriesExhausted {
                attempts: attempt + 1,
                last_status: Some(*status),
                last_error: error.to_string(),
            });
        }
        RetryDecision::GiveUp(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Sleeps between attempts. Swappable so tests can record delays instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
