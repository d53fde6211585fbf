//! Error types for the freshness ledger

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur when talking to the remote store
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The store URL could not be parsed
    #[error("invalid ledger URL: {0}")]
    InvalidUrl(#[source] redis::RedisError),

    /// The store could not be reached (refused, dropped, timed out)
    #[error("ledger store unreachable: {0}")]
    Unreachable(#[source] redis::RedisError),

    /// The store answered with an error
    #[error("ledger store error: {0}")]
    Store(#[source] redis::RedisError),

    /// `threshold` units of `unit_secs` do not make a usable expiry
    #[error("marker window of {threshold} x {unit_secs}s is out of range")]
    WindowOutOfRange { threshold: u32, unit_secs: u64 },
}

impl LedgerError {
    /// Check if this error means the store could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<redis::RedisError> for LedgerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
        {
            Self::Unreachable(err)
        } else {
            Self::Store(err)
        }
    }
}
