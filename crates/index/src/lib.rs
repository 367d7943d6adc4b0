//! Incremental, resumable spatial classification index.
//!
//! Given a large, growing remote media library, this crate determines — once
//! per item, durably — whether each item has the spatial property, and keeps
//! that classification consistent as the visible library changes. The probe
//! that inspects an item's bytes and the catalog that lists the library are
//! collaborators behind traits (`parallax-probe`, `parallax-catalog`); this
//! crate owns the scan orchestration, the persisted sets, and the read API.

pub mod db;
pub mod error;
mod models;
mod scanner;
pub mod store;

pub use crate::db::Database;
pub use crate::models::{IndexState, ScanState, SpatialRecord};
pub use crate::scanner::{ScanProgress, SpatialIndex};
pub use crate::store::IndexStore;
