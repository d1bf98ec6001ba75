//! Batch client for the LMUnit scoring API.
//!
//! Submits `{query, response, unit_test}` evaluation requests one at a time
//! through a rate limiter, retries failed attempts with exponential backoff,
//! and returns exactly one [`Outcome`] per request, in request order. A
//! failing item never aborts the rest of the batch.
//!
//! # Quick Start
//!
//! ```no_run
//! use lmunit_client::{BatchClient, ClientConfig, UnitTestRequest};
//!
//! # async fn example() -> Result<(), lmunit_client::LmunitError> {
//! let config = ClientConfig::from_env().with_rate_limit(2);
//! let mut client = BatchClient::new(config)?;
//!
//! let requests = vec![UnitTestRequest::new(
//!     "What is 2 + 2?",
//!     "4",
//!     "Does the response arrive at the correct solution?",
//! )];
//!
//! // Starts the session, runs every request, always closes the session.
//! for outcome in client.run_batch(&requests).await? {
//!     match outcome.score() {
//!         Some(score) => println!("score {}", score),
//!         None => println!("failed: {:?}", outcome.error()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `LMUNIT_URL` | Endpoint (default: `https://api.contextual.ai/v1/lmunit`) |
//! | `LMUNIT_API_KEY` | Bearer token |
//! | `LMUNIT_RATE_LIMIT` | Attempts per second (default: 1) |
//! | `LMUNIT_MAX_RETRIES` | Attempts per request (default: 10) |
//! | `LMUNIT_BASE_DELAY` | Backoff base in seconds (default: 1.0) |
//! | `LMUNIT_TIMEOUT` | Per-attempt timeout in seconds (default: 30) |
//! | `LMUNIT_BATCH_DEADLINE` | Whole-batch deadline in seconds (default: none) |

pub mod client;
pub mod error;
pub mod limiter;
pub mod retry;
pub mod session;
pub mod types;

pub use client::BatchClient;
pub use error::{LmunitError, LmunitResult};
pub use limiter::RateLimiter;
pub use retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{HttpSession, Reply, Transport};
pub use types::{ApiKey, ClientConfig, Outcome, ScorePayload, UnitTestRequest, DEFAULT_URL};

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = session::USER_AGENT_VALUE;
