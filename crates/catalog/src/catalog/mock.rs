//! In-memory catalog for testing.

use super::MediaCatalog;
use crate::error::Result;
use crate::models::MediaItem;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory media catalog for testing.
///
/// Items live in a `Vec` behind a [`RwLock`], so visibility changes can be
/// simulated mid-test with [`set_items`](Self::set_items) while the catalog
/// is shared behind an `Arc`. Listing order is insertion order, which stands
/// in for the remote catalog's stable ordering.
///
/// # Examples
///
/// ```
/// use parallax_catalog::{MediaCatalog, MockCatalog};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = MockCatalog::default();
/// assert!(catalog.list_visible_items(10).await?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct MockCatalog {
    name: String,
    items: RwLock<Vec<MediaItem>>,
}

impl MockCatalog {
    /// Create a mock catalog pre-populated with visible items.
    pub fn with_items(items: impl IntoIterator<Item = MediaItem>) -> Self {
        Self {
            name: "mock".to_string(),
            items: RwLock::new(items.into_iter().collect()),
        }
    }

    /// Change the name of the mock catalog.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the visible item list wholesale.
    ///
    /// This is how tests simulate items being hidden, deleted, or restored
    /// between scans.
    pub async fn set_items(&self, items: impl IntoIterator<Item = MediaItem>) {
        *self.items.write().await = items.into_iter().collect();
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::with_items([])
    }
}

#[async_trait]
impl MediaCatalog for MockCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<MediaItem>> {
        let guard = self.items.read().await;
        Ok(guard.iter().skip(offset).take(limit).cloned().collect())
    }
}
