//! Index Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Probe failures deliberately do not appear here: inside a scan they degrade
//! the one item to scanned-not-spatial and are only logged.

use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Persistence failure while loading or flushing index state.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A persisted value could not be deserialized.
    #[display("invalid persisted index data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The catalog collaborator failed while listing the visible library.
    #[display("catalog listing failed")]
    Catalog,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog)
    }
}
