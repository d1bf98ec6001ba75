//! Attempt loop: permit, send, classify, back off.
//!
//! This is the ONLY place that interprets status codes. Sessions return raw
//! replies; the orchestrator only sees `Ok(payload)` or a terminal error.

use tracing::{debug, warn};

use crate::error::{LmunitError, LmunitResult};
use crate::retry::RetryDecision;
use crate::session::{Reply, Transport};
use crate::types::{ScorePayload, UnitTestRequest};

use super::BatchClient;

/// Map a raw reply onto success or a retryable failure.
pub(crate) fn classify(reply: Reply) -> LmunitResult<ScorePayload> {
    if reply.status != 200 {
        let message: String = reply.body.chars().take(200).collect();
        return Err(LmunitError::Status {
            status: reply.status,
            message,
        });
    }

    serde_json::from_str(&reply.body)
        .map(ScorePayload)
        .map_err(|e| LmunitError::InvalidResponse {
            message: format!("failed to decode score payload: {}", e),
        })
}

impl<T: Transport> BatchClient<T> {
    /// Run up to `max_retries` attempts for one request. `attempts` counts
    /// every attempt that reached the session, and stays valid if this
    /// future is dropped by a deadline.
    pub(crate) async fn attempt_with_backoff(
        &self,
        request: &UnitTestRequest,
        attempts: &mut u32,
    ) -> LmunitResult<ScorePayload> {
        if !self.session.is_started() {
            return Err(LmunitError::NotStarted);
        }

        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;
            *attempts += 1;

            let result = match self.session.post(request).await {
                Ok(reply) => classify(reply),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(payload) => {
                    debug!(attempt, "request succeeded");
                    return Ok(payload);
                }
                Err(e) => e,
            };

            match self.policy.decide(attempt, error.clone()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        error = %error,
                        status = ?error.last_status(),
                        attempt,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis(),
                        "request failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(fatal) => {
                    warn!(error = %error, attempt, "request failed, giving up");
                    return Err(fatal);
                }
            }
        }
    }
}
