//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every probe client and the local
//! mirror tree report failures through [`ErrorKind`].

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Only [`BucketNotFound`](ErrorKind::BucketNotFound) is a definitive answer
/// about a bucket; everything else means "we could not find out".
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The storage service confirmed that the bucket does not exist
    #[display("bucket not found: {_0}")]
    BucketNotFound(#[error(not(source))] String),
    /// The storage service refused the request
    #[display("access denied: {_0}")]
    AccessDenied(#[error(not(source))] String),
    /// The storage service answered with an error
    #[display("service error: {_0}")]
    Service(#[error(not(source))] String),
    /// The request never got an answer (DNS, TLS, connection reset...)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The request did not complete in time
    #[display("timed out after {}s", _0.as_secs_f32())]
    Timeout(#[error(not(source))] Duration),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Local path is not usable as a mirror root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Object key cannot be mapped onto the local filesystem
    #[display("invalid object key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    /// The requested bucket rendering format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Timeout(_) | Self::Service(_))
    }

    /// Returns `true` if the service confirmed the bucket is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::BucketNotFound("acme".to_string()).to_string(), "bucket not found: acme");
        assert_eq!(ErrorKind::Timeout(Duration::from_secs(2)).to_string(), "timed out after 2s");
        assert_eq!(ErrorKind::InvalidKey("../x".to_string()).to_string(), "invalid object key: ../x");
    }

    #[test]
    fn error_kind_classification() {
        assert!(ErrorKind::BucketNotFound("acme".to_string()).is_not_found());
        assert!(!ErrorKind::AccessDenied("acme".to_string()).is_not_found());
        assert!(ErrorKind::Network("reset".to_string()).is_retryable());
        assert!(!ErrorKind::BucketNotFound("acme".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidKey("".to_string()).is_retryable());
    }
}
