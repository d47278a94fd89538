//! # Client Errors
//!
//! One error type for every failure the client surfaces. Variants are grouped
//! so callers can tell apart "could not get a connection", "the store said
//! no" and "the reply was not what the method expected".

use thiserror::Error;

/// Result type for the client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// An option value cannot be used (unknown network, bad duration, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Dialing, authenticating or the construction-time liveness check failed.
    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: redis::RedisError,
    },

    /// Pool is at `max_active` and the wait policy is fail-fast.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Pool was closed with [`Manager::close`](crate::Manager::close).
    #[error("connection pool closed")]
    PoolClosed,

    /// The call context deadline passed while waiting or executing.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The call context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The store rejected or failed the command.
    #[error("command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// A helper got an argument it cannot send, such as field/value pairs
    /// where a single value belongs. Nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reply type did not match the expected command response.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when no connection could be leased from the pool.
    pub fn is_acquire_error(&self) -> bool {
        matches!(
            self,
            Error::PoolExhausted | Error::PoolClosed | Error::DeadlineExceeded | Error::Cancelled
        )
    }

    /// True when the store answered but the answer could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::UnexpectedReply(_) | Error::Json(_))
    }

    /// True for context deadlines and socket timeouts.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::DeadlineExceeded => true,
            Error::Command(err) => err.is_timeout(),
            _ => false,
        }
    }

    pub(crate) fn unexpected(expected: &str, got: &redis::Value) -> Self {
        Error::UnexpectedReply(format!("expected {expected}, got {got:?}"))
    }
}
