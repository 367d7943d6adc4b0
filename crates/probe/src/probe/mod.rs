//! Spatial probe trait and implementations.
//!
//! The probe is the expensive part of classification: it downloads an item's
//! bytes and inspects them for the spatial property. A single call can take
//! seconds. Everything transport- and codec-related lives behind this trait;
//! the index treats it as an opaque async yes/no oracle.

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use self::mock::MockProbe;
use crate::error::Result;
use async_trait::async_trait;
use parallax_catalog::{ItemId, MediaKind};

/// Capability check for the spatial property of a single item.
///
/// # Contract
///
/// - Safe to call repeatedly for the same item; the verdict is deterministic
///   per item, so duplicate calls are wasteful but harmless.
/// - Must not mutate any index state itself.
/// - Failures are per-item and independently retryable; a failed call says
///   nothing about other items.
#[async_trait]
pub trait SpatialProbe: Send + Sync {
    /// Fetch the item's bytes and report whether it is spatial.
    async fn probe(&self, id: &ItemId, kind: MediaKind) -> Result<bool>;
}
