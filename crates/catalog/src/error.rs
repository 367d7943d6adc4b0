//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::models::ItemId;
use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Transport-level failure while talking to the remote catalog.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The catalog responded, but the payload couldn't be understood.
    #[display("malformed catalog response: {_0}")]
    Decode(#[error(not(source))] String),
    /// The requested item is not visible in the library.
    #[display("item not found: {_0}")]
    NotFound(#[error(not(source))] ItemId),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
