//! Media catalog trait and implementations.
//!
//! The catalog is the remote listing service: it knows which items are
//! currently visible in the library and in what order. Transport details
//! (HTTP, auth, pagination tokens) belong to implementations; this crate
//! only fixes the interface the classification index consumes.

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use self::mock::MockCatalog;
use crate::error::Result;
use crate::models::MediaItem;
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

type MediaItemStream<'a> = Pin<Box<dyn Stream<Item = Result<MediaItem>> + Send + 'a>>;

/// Unified interface for remote media catalogs.
///
/// Implementations expose the *currently visible* library as an ordered,
/// paged sequence. Items that are hidden or soft-deleted on the remote end
/// simply stop appearing in pages; the index reconciles from that.
///
/// # Examples
///
/// ```
/// use parallax_catalog::{MediaCatalog, error::Result};
///
/// async fn count_visible(catalog: &dyn MediaCatalog) -> Result<usize> {
///     Ok(catalog.list_visible_items(200).await?.len())
/// }
/// ```
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Name of the configured catalog (used for logging only).
    fn name(&self) -> &str;

    /// Fetch one page of visible items, in stable catalog order.
    ///
    /// A page shorter than `limit` signals the end of the listing.
    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<MediaItem>>;

    /// Stream every visible item, paging lazily.
    ///
    /// Pages of `page_size` are requested as the stream is polled, so a
    /// caller that stops early never pays for the rest of the library.
    fn list_stream(&self, page_size: usize) -> MediaItemStream<'_> {
        // A zero page size would never terminate; clamp rather than error.
        let page_size = page_size.max(1);
        Box::pin(stream! {
            let mut offset = 0;
            loop {
                tracing::trace!(catalog = self.name(), offset, "requesting catalog page");
                let page = match self.page(offset, page_size).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                let fetched = page.len();
                for item in page {
                    yield Ok(item);
                }
                if fetched < page_size {
                    break;
                }
                offset += fetched;
            }
        })
    }

    /// List every visible item by collecting [`list_stream`](Self::list_stream)
    /// into a [`Vec`]. Order is the catalog's own ordering.
    async fn list_visible_items(&self, page_size: usize) -> Result<Vec<MediaItem>> {
        self.list_stream(page_size).try_collect().await
    }
}
