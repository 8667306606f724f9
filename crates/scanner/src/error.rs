//! Scanner Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Very little can fail at this level: per-bucket failures are recorded in
//! each [`ProbeResult`](crate::ProbeResult) instead of being returned. What's
//! left is what stops the whole scan.

use derive_more::{Display, Error};

/// A scanner error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The bucket list could not be opened or read.
    #[display("could not read input: {_0}")]
    Input(#[error(not(source))] String),
    /// A probe client could not be constructed for a worker.
    #[display("could not create probe client")]
    Client,
    /// A worker task died before draining the queue.
    #[display("scan worker failed: {_0}")]
    Worker(#[error(not(source))] String),
}
