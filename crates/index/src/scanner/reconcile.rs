//! Prune and restore: keeping classifications consistent as items leave and
//! re-enter the visible library.
//!
//! A spatial item that disappears from view must stop counting as spatial,
//! but its (expensive) classification is moved aside rather than dropped, so
//! reappearance costs nothing. Records *move* between the active and hidden
//! tables; they are never copied, so each id owns exactly one record.

use crate::models::IndexState;
use parallax_catalog::{ItemId, MediaItem};
use std::collections::HashSet;

impl IndexState {
    /// Remove every spatial classification whose item is absent from
    /// `visible`, relocating its metadata to the hidden table.
    ///
    /// Ids that were scanned-not-spatial are left alone: there is no record
    /// to preserve and rescanning them on return would be wasted work if
    /// they never return.
    ///
    /// Returns the number of items pruned.
    pub(crate) fn prune(&mut self, visible: &HashSet<ItemId>) -> usize {
        let gone: Vec<ItemId> = self.spatial.iter().filter(|id| !visible.contains(*id)).cloned().collect();
        for id in &gone {
            self.spatial.remove(id);
            self.scanned.remove(id);
            if let Some(record) = self.spatial_records.remove(id) {
                self.hidden_records.insert(id.clone(), record);
            }
        }
        gone.len()
    }

    /// Reinstate an item that has reappeared in the visible library.
    ///
    /// With a hidden record, the prior classification comes back for free:
    /// no probe. Without one, the id's scanned status (if any) is revoked so
    /// the next scan reclassifies it — either it was never confirmed spatial
    /// or its record was lost.
    ///
    /// Returns `true` if a hidden classification was restored.
    pub(crate) fn restore(&mut self, item: &MediaItem) -> bool {
        match self.hidden_records.remove(&item.id) {
            Some(record) => {
                self.scanned.insert(item.id.clone());
                self.spatial.insert(item.id.clone());
                self.spatial_records.insert(item.id.clone(), record);
                true
            },
            None => {
                self.scanned.remove(&item.id);
                false
            },
        }
    }
}
