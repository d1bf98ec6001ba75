//! Error types for the LMUnit client.

/// Client errors.
///
/// Every fatal error for a single request ends up inside that request's
/// [`Outcome`](crate::Outcome); none of them abort a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LmunitError {
    /// The endpoint answered with a status other than 200.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, timeout or body read failure.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The endpoint answered 200 but the body was not JSON.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// A request was issued before the session was started.
    #[error("session not started; call start() first")]
    NotStarted,

    /// Every allowed attempt failed with a retryable status.
    #[error("max retries ({attempts}) exceeded: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
        last_error: String,
    },

    /// The batch deadline passed before the item completed.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl LmunitError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Transport { .. } | Self::InvalidResponse { .. }
        )
    }

    /// Last HTTP status observed for the failing item, when known.
    pub fn last_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LmunitError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Result type for client operations.
pub type LmunitResult<T> = Result<T, LmunitError>;
