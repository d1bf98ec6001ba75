//! Request, response and configuration types for the LMUnit protocol.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{LmunitError, LmunitResult};

/// One unit-test evaluation request.
///
/// Serializes to the exact wire body: `{"query", "response", "unit_test"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTestRequest {
    /// The prompt the evaluated model answered.
    pub query: String,

    /// The model response under test.
    pub response: String,

    /// Natural-language unit test, e.g. "Is the response helpful?".
    pub unit_test: String,
}

impl UnitTestRequest {
    pub fn new(
        query: impl Into<String>,
        response: impl Into<String>,
        unit_test: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            unit_test: unit_test.into(),
        }
    }
}

/// Decoded body of a successful (HTTP 200) reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScorePayload(pub Value);

impl ScorePayload {
    /// Numeric `score` field, if the endpoint sent one.
    pub fn score(&self) -> Option<f64> {
        self.0.get("score").and_then(Value::as_f64)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Per-request result: the success payload or the terminal error.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Network attempts made for this request.
    pub attempts: u32,

    pub result: Result<ScorePayload, LmunitError>,
}

impl Outcome {
    pub fn success(attempts: u32, payload: ScorePayload) -> Self {
        Self {
            attempts,
            result: Ok(payload),
        }
    }

    pub fn failure(attempts: u32, error: LmunitError) -> Self {
        Self {
            attempts,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.result, Err(LmunitError::Cancelled { .. }))
    }

    pub fn score(&self) -> Option<f64> {
        self.result.as_ref().ok().and_then(ScorePayload::score)
    }

    pub fn error(&self) -> Option<&LmunitError> {
        self.result.as_ref().err()
    }

    /// Outbound record: the payload itself on success, otherwise an error
    /// descriptor `{"error", "status", "attempts"}`.
    pub fn to_record(&self) -> Value {
        match &self.result {
            Ok(payload) => payload.0.clone(),
            Err(e) => json!({
                "error": e.to_string(),
                "status": e.last_status(),
                "attempts": self.attempts,
            }),
        }
    }
}

/// Bearer token for the scoring endpoint. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scoring endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer token.
    #[serde(default)]
    pub api_key: Option<ApiKey>,

    /// Permits per second admitted by the rate limiter.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Maximum attempts per request (including the first).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,

    /// Per-attempt deadline in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: f64,

    /// Overall deadline for one batch, in seconds.
    #[serde(default)]
    pub batch_deadline_secs: Option<f64>,
}

pub const DEFAULT_URL: &str = "https://api.contextual.ai/v1/lmunit";

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_rate_limit() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    10
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    30.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            rate_limit: default_rate_limit(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            request_timeout_secs: default_timeout(),
            batch_deadline_secs: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `LMUNIT_URL` | Endpoint URL |
    /// | `LMUNIT_API_KEY` | Bearer token (falls back to `CONTEXTUAL_API_KEY`) |
    /// | `LMUNIT_RATE_LIMIT` | Requests per second |
    /// | `LMUNIT_MAX_RETRIES` | Attempts per request |
    /// | `LMUNIT_BASE_DELAY` | Backoff base in seconds |
    /// | `LMUNIT_TIMEOUT` | Per-attempt timeout in seconds |
    /// | `LMUNIT_BATCH_DEADLINE` | Whole-batch deadline in seconds |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("LMUNIT_URL").unwrap_or_else(|_| default_url()),
            api_key: std::env::var("LMUNIT_API_KEY")
                .or_else(|_| std::env::var("CONTEXTUAL_API_KEY"))
                .ok()
                .filter(|v| !v.is_empty())
                .map(ApiKey::new),
            rate_limit: env_parse("LMUNIT_RATE_LIMIT").unwrap_or_else(default_rate_limit),
            max_retries: env_parse("LMUNIT_MAX_RETRIES").unwrap_or_else(default_max_retries),
            base_delay_secs: env_parse("LMUNIT_BASE_DELAY").unwrap_or_else(default_base_delay),
            request_timeout_secs: env_parse("LMUNIT_TIMEOUT").unwrap_or_else(default_timeout),
            batch_deadline_secs: env_parse("LMUNIT_BATCH_DEADLINE"),
        }
    }

    /// Check the values a client cannot run with.
    pub fn validate(&self) -> LmunitResult<()> {
        let fail = |message: &str| {
            Err(LmunitError::Config {
                message: message.to_string(),
            })
        };

        match &self.api_key {
            Some(key) if !key.is_empty() => {}
            _ => return fail("api key is required (set LMUNIT_API_KEY)"),
        }
        if self.url.trim().is_empty() {
            return fail("endpoint url is empty");
        }
        if self.rate_limit == 0 {
            return fail("rate_limit must be at least 1");
        }
        if self.max_retries == 0 {
            return fail("max_retries must be at least 1");
        }
        if Duration::try_from_secs_f64(self.base_delay_secs).is_err() {
            return fail("base_delay must be a non-negative number of seconds");
        }
        match Duration::try_from_secs_f64(self.request_timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => {}
            _ => return fail("timeout must be a positive number of seconds"),
        }
        if let Some(deadline) = self.batch_deadline_secs {
            if Duration::try_from_secs_f64(deadline).is_err() {
                return fail("batch_deadline must be a non-negative number of seconds");
            }
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        secs_to_duration(self.base_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs_to_duration(self.request_timeout_secs)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(secs_to_duration)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay_secs = base_delay.as_secs_f64();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.batch_deadline_secs = deadline.map(|d| d.as_secs_f64());
        self
    }
}

/// Negative and NaN clamp to zero, values past `Duration::MAX` saturate.
fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
