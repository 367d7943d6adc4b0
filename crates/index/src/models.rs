//! In-memory shape of the classification index.
//!
//! These types mirror what the store persists. Classification status is
//! derived from set membership, never stored directly, so the two sets can
//! never disagree with a stored status field.

use parallax_catalog::{ItemId, MediaItem, MediaKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;

/// Display metadata retained for an item classified spatial.
///
/// Enough to render the item later without another catalog round-trip.
/// Only spatial items get one; not-spatial items leave no record beyond
/// their id in the scanned set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialRecord {
    pub id: ItemId,
    pub kind: MediaKind,
    pub file_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl From<&MediaItem> for SpatialRecord {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            kind: item.kind,
            file_name: item.file_name.clone(),
            created_at: item.created_at,
            modified_at: item.modified_at,
        }
    }
}

/// Per-item classification status, reconstructed from set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unscanned,
    ScannedNotSpatial,
    ScannedSpatial,
}

/// In-memory mirror of the persisted index.
///
/// Mutated exclusively by the orchestrator under its state lock, flushed to
/// the store at checkpoints. Invariants upheld by the mutators here and in
/// the reconciliation module:
///
/// - `spatial ⊆ scanned`
/// - an id has a record in at most one of `spatial_records` / `hidden_records`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexState {
    /// Every id ever classified, spatial or not. Cumulative across sessions.
    pub scanned: HashSet<ItemId>,
    /// Ids confirmed spatial.
    pub spatial: HashSet<ItemId>,
    /// Display metadata for spatial items.
    pub spatial_records: HashMap<ItemId, SpatialRecord>,
    /// Metadata for pruned-but-remembered items, keyed for cheap restoration.
    pub hidden_records: HashMap<ItemId, SpatialRecord>,
    /// When the last full scan ran to natural completion.
    pub last_scan: Option<OffsetDateTime>,
}

impl IndexState {
    pub fn scan_state(&self, id: &ItemId) -> ScanState {
        if self.spatial.contains(id) {
            ScanState::ScannedSpatial
        } else if self.scanned.contains(id) {
            ScanState::ScannedNotSpatial
        } else {
            ScanState::Unscanned
        }
    }

    /// Record a positive probe verdict for a visible item.
    pub(crate) fn record_spatial(&mut self, item: &MediaItem) {
        self.scanned.insert(item.id.clone());
        self.spatial.insert(item.id.clone());
        self.spatial_records.insert(item.id.clone(), SpatialRecord::from(item));
        // One record per id across both tables.
        self.hidden_records.remove(&item.id);
    }

    /// Record a negative (or failed) probe verdict.
    pub(crate) fn record_scanned(&mut self, id: &ItemId) {
        self.scanned.insert(id.clone());
    }

    /// Manual spatial override, e.g. the property was observed while
    /// rendering. Metadata is optional and never replaces an existing record.
    pub(crate) fn record_spatial_manual(&mut self, id: &ItemId, metadata: Option<&MediaItem>) {
        self.scanned.insert(id.clone());
        self.spatial.insert(id.clone());
        if let Some(record) = self.hidden_records.remove(id) {
            self.spatial_records.entry(id.clone()).or_insert(record);
        }
        if let Some(item) = metadata {
            if !self.spatial_records.contains_key(id) {
                self.spatial_records.insert(id.clone(), SpatialRecord::from(item));
            }
        }
    }
}
