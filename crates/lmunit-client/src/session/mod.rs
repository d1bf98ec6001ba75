//! Transport sessions: the only path from the client to the network.
//!
//! A session has an explicit lifecycle. `start()` acquires resources once,
//! `close()` releases them, and both are idempotent. Sending on a session
//! that is not started fails with [`LmunitError::NotStarted`] instead of
//! starting it implicitly.
//!
//! Sessions never interpret status codes; that happens in the client's
//! attempt loop.

use async_trait::async_trait;

use crate::error::LmunitResult;
use crate::types::UnitTestRequest;

mod http;

pub use http::{HttpSession, USER_AGENT_VALUE};

/// Raw reply to one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire the connection. No-op when already started.
    async fn start(&mut self) -> LmunitResult<()>;

    /// Release the connection. No-op when not started.
    async fn close(&mut self);

    /// Release the connection without awaiting anything. Called when a batch
    /// future is dropped before it could run `close()`.
    fn close_now(&mut self);

    fn is_started(&self) -> bool;

    /// Send one attempt. Transport-level failures are errors; any HTTP
    /// status, including failures, is a `Reply`.
    async fn post(&self, request: &UnitTestRequest) -> LmunitResult<Reply>;
}
