//! Store error types
//!
//! Defines all errors that can occur while talking to the backing store.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach the store (connect, I/O, dropped connection)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command
    #[error("Command error: {0}")]
    Command(String),

    /// A stored value has the wrong shape (e.g. list operation on a string)
    #[error("Wrong type for key {0}")]
    WrongType(String),

    /// Stored bytes could not be decoded (bad gzip stream)
    #[error("Corrupt data under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Compression failed while building a new blob
    #[error("Compression error: {0}")]
    Compression(String),
}

impl StoreError {
    /// Whether the error came from the connection rather than the data
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Corrupt {
            key: "lvat-request_id-req1-gzip".to_string(),
            reason: "invalid gzip header".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt data under lvat-request_id-req1-gzip: invalid gzip header"
        );

        let err = StoreError::WrongType("lvat-request_id-req1".to_string());
        assert_eq!(err.to_string(), "Wrong type for key lvat-request_id-req1");
    }

    #[test]
    fn test_redis_io_error_is_connection() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: StoreError = redis::RedisError::from(io_err).into();
        assert!(err.is_connection());
    }
}
