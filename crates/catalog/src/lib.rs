pub mod catalog;
pub mod error;
mod models;

pub use crate::catalog::MediaCatalog;
#[cfg(feature = "mock")]
pub use crate::catalog::MockCatalog;
pub use crate::models::{ItemId, MediaItem, MediaKind};
use std::sync::Arc;

pub type CatalogHandle = Arc<dyn MediaCatalog + Send + Sync>;
