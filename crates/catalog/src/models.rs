//! Data model shared with the probe and index crates.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque stable identifier for a library item.
///
/// The remote catalog mints these; the index never inspects the contents,
/// only compares and stores them. Serializes as a bare string so it can act
/// as a JSON map key in the persisted metadata tables.
#[derive(Debug, Clone, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Broad asset type, as reported by the catalog.
///
/// The probe needs this to pick a decoder; the index stores it so spatial
/// items can be rendered later without another catalog round-trip.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[display("image")]
    Image,
    #[display("video")]
    Video,
}

/// One entry in the remote media library.
///
/// This is the minimal metadata needed to render an item later without
/// re-fetching it from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: ItemId,
    pub kind: MediaKind,
    pub file_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl MediaItem {
    pub fn new(
        id: impl Into<ItemId>,
        kind: MediaKind,
        file_name: impl Into<String>,
        created_at: OffsetDateTime,
        modified_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            file_name: file_name.into(),
            created_at,
            modified_at,
        }
    }
}
