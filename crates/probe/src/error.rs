//! Probe Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use parallax_catalog::MediaKind;

/// A probe error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant is non-fatal to a scan: the orchestrator records the item
/// as scanned-not-spatial and moves on. `is_retryable` is advisory for
/// callers outside a scan session; the session itself never retries.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The item's bytes could not be downloaded.
    #[display("failed to fetch item bytes: {_0}")]
    Fetch(#[error(not(source))] String),
    /// The bytes were fetched but could not be decoded as media.
    #[display("failed to decode item: {_0}")]
    Decode(#[error(not(source))] String),
    /// The probe has no decoder for this asset type.
    #[display("unsupported media kind: {_0}")]
    Unsupported(#[error(not(source))] MediaKind),
    /// The probe gave up waiting on a slow fetch or decode.
    #[display("probe timed out")]
    Timeout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout)
    }
}
