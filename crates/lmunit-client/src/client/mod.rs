//! Batch orchestrator.
//!
//! Requests are processed strictly in order, one at a time. Every attempt
//! takes a permit from the rate limiter, failures go through the retry
//! policy, and whatever is left at the end of an item's attempt budget
//! becomes that item's outcome. No single item can abort the batch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{LmunitError, LmunitResult};
use crate::limiter::RateLimiter;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::session::{HttpSession, Transport};
use crate::types::{ClientConfig, Outcome, UnitTestRequest};

mod attempt;

/// Rate-limited, retrying batch client. Owns its session and limiter.
#[derive(Debug)]
pub struct BatchClient<T = HttpSession> {
    session: T,
    limiter: RateLimiter,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    batch_deadline: Option<Duration>,
}

impl BatchClient<HttpSession> {
    pub fn new(config: ClientConfig) -> LmunitResult<Self> {
        let session = HttpSession::new(&config)?;
        Ok(Self::with_transport(session, &config))
    }

    pub fn from_env() -> LmunitResult<Self> {
        Self::new(ClientConfig::from_env())
    }
}

impl<T: Transport> BatchClient<T> {
    pub fn with_transport(session: T, config: &ClientConfig) -> Self {
        Self {
            session,
            limiter: RateLimiter::per_second(config.rate_limit),
            policy: RetryPolicy::from_config(config),
            sleeper: Arc::new(TokioSleeper),
            batch_deadline: config.batch_deadline(),
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.batch_deadline = deadline;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn session(&self) -> &T {
        &self.session
    }

    pub async fn start(&mut self) -> LmunitResult<()> {
        self.session.start().await
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// Submit one request through the attempt loop.
    pub async fn submit(&self, request: &UnitTestRequest) -> Outcome {
        let mut attempts = 0;
        let result = self.attempt_with_backoff(request, &mut attempts).await;
        Outcome { attempts, result }
    }

    /// Submit every request in order and return one outcome per request,
    /// at the same index. The session must already be started.
    pub async fn submit_batch(&self, requests: &[UnitTestRequest]) -> Vec<Outcome> {
        // A deadline past the clock's range means no deadline.
        let deadline = self
            .batch_deadline
            .and_then(|d| Instant::now().checked_add(d));
        let mut outcomes = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            let outcome = match deadline {
                Some(deadline) => self.submit_before(request, deadline).await,
                None => self.submit(request).await,
            };

            if let Err(e) = &outcome.result {
                warn!(index, attempts = outcome.attempts, error = %e, "request failed");
            }
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();
        info!(
            total = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded - cancelled,
            cancelled,
            "batch complete"
        );
        outcomes
    }

    /// Start the session, submit the batch and close the session exactly once,
    /// also when a panic escapes the batch loop (it is re-raised after closing)
    /// or when the returned future is dropped before completion.
    pub async fn run_batch(&mut self, requests: &[UnitTestRequest]) -> LmunitResult<Vec<Outcome>> {
        let mut guard = CloseOnDrop { client: self };

        if let Err(e) = guard.client.start().await {
            guard.client.close().await;
            return Err(e);
        }

        let result = AssertUnwindSafe(guard.client.submit_batch(requests))
            .catch_unwind()
            .await;
        guard.client.close().await;

        match result {
            Ok(outcomes) => Ok(outcomes),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn submit_before(&self, request: &UnitTestRequest, deadline: Instant) -> Outcome {
        if Instant::now() >= deadline {
            return Outcome::failure(0, deadline_passed());
        }

        let mut attempts = 0;
        let result = tokio::time::timeout_at(
            deadline,
            self.attempt_with_backoff(request, &mut attempts),
        )
        .await;

        match result {
            Ok(result) => Outcome { attempts, result },
            Err(_) => Outcome::failure(attempts, deadline_passed()),
        }
    }
}

/// Closes the session synchronously if a `run_batch` future is dropped
/// mid-flight. A no-op once `close()` has run.
struct CloseOnDrop<'a, T: Transport> {
    client: &'a mut BatchClient<T>,
}

impl<T: Transport> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.client.session.close_now();
    }
}

fn deadline_passed() -> LmunitError {
    LmunitError::Cancelled {
        reason: "batch deadline exceeded".to_string(),
    }
}
