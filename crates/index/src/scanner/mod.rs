//! Scan orchestration: the single-flight full scan, the incremental
//! background scan, and the classification read surface.
//!
//! The orchestrator owns the in-memory [`IndexState`] behind one async mutex
//! (the single-writer discipline: every mutation, whether from the session
//! task, a background batch, or a manual mark, goes through it). The probe is
//! the only suspension point and is never awaited while the lock is held, so
//! readers always observe a consistent — if momentarily stale — snapshot.

mod reconcile;
mod session;

pub use self::session::ScanProgress;
use self::session::ProgressCounters;
use crate::db::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{IndexState, ScanState, SpatialRecord};
use crate::store::IndexStore;
use exn::ResultExt;
use parallax_catalog::{CatalogHandle, ItemId, MediaItem};
use parallax_config::ScanSettings;
use parallax_probe::ProbeHandle;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The classification index: scan orchestrator plus read surface.
///
/// Cheap to clone; all clones share the same state. At most one full-scan
/// session is alive at a time — starting a new scan cancels and waits out
/// the previous session before creating its own.
#[derive(Clone)]
pub struct SpatialIndex {
    inner: Arc<Inner>,
}

struct Inner {
    store: IndexStore,
    probe: ProbeHandle,
    settings: ScanSettings,
    /// The four persisted sets plus the last-scan timestamp, treated as a
    /// single resource: lock, mutate, unlock. Never held across a probe.
    state: Mutex<IndexState>,
    progress: ProgressCounters,
    /// Cooperative cancellation for the active session. One flag suffices
    /// because at most one session task is ever alive.
    cancel: AtomicBool,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Checkpoint the in-memory state. A flush failure is logged and
    /// swallowed: memory stays authoritative and the next successful flush
    /// reconciles the store.
    async fn flush(&self, state: &IndexState) {
        if let Err(e) = self.store.save(state).await {
            tracing::warn!(error = ?e, "failed to checkpoint index state");
        }
    }
}

impl SpatialIndex {
    /// Load the persisted index into memory and wire up the probe.
    pub async fn load(db: &Database, probe: ProbeHandle, settings: ScanSettings) -> Result<Self> {
        let store = IndexStore::from(db);
        let state = store.load().await?;
        tracing::debug!(scanned = state.scanned.len(), spatial = state.spatial.len(), "loaded index");
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                probe,
                settings,
                state: Mutex::new(state),
                progress: ProgressCounters::default(),
                cancel: AtomicBool::new(false),
                session: Mutex::new(None),
            }),
        })
    }

    // =========================================================================
    // Full scan
    // =========================================================================

    /// Start a full scan over the currently visible library.
    ///
    /// Cancels any active session first, then prunes classifications whose
    /// items are absent from `visible`, then probes the unscanned remainder
    /// in input order on a background task. Items already scanned in any
    /// previous session are never reprobed, so repeated calls over an
    /// unchanged library are cheap: when nothing is left to scan, no session
    /// is created and this returns with no work done.
    ///
    /// Returns as soon as the session task is spawned; poll
    /// [`progress`](Self::progress) or [`wait_for_scan`](Self::wait_for_scan)
    /// to observe it.
    pub async fn start_scan(&self, visible: Vec<MediaItem>) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        // Single-flight: wait out the previous session. Its partial progress
        // is flushed by the session task itself on the way out.
        if let Some(handle) = session.take() {
            self.inner.cancel.store(true, Ordering::Relaxed);
            let _ = handle.await;
        }

        let to_scan = {
            let mut state = self.inner.state.lock().await;
            let visible_ids: HashSet<ItemId> = visible.iter().map(|item| item.id.clone()).collect();
            let pruned = state.prune(&visible_ids);
            if pruned > 0 {
                tracing::debug!(pruned, "pruned classifications for items no longer visible");
                self.inner.flush(&state).await;
            }
            visible.into_iter().filter(|item| !state.scanned.contains(&item.id)).collect::<Vec<_>>()
        };
        if to_scan.is_empty() {
            tracing::debug!("visible library already classified; no session started");
            return Ok(());
        }

        tracing::debug!(total = to_scan.len(), "starting scan session");
        self.inner.cancel.store(false, Ordering::Relaxed);
        self.inner.progress.begin(to_scan.len() as u64);
        let inner = Arc::clone(&self.inner);
        *session = Some(tokio::spawn(run_session(inner, to_scan)));
        Ok(())
    }

    /// List the visible library from `catalog` and [`start_scan`](Self::start_scan) over it.
    pub async fn refresh_from(&self, catalog: &CatalogHandle) -> Result<()> {
        let visible =
            catalog.list_visible_items(self.inner.settings.page_size).await.or_raise(|| ErrorKind::Catalog)?;
        self.start_scan(visible).await
    }

    /// Signal cancellation without waiting. The session finishes its
    /// in-flight probe, commits that item, flushes, and exits.
    pub fn request_cancel(&self) {
        self.inner.cancel.store(true, Ordering::Relaxed);
    }

    /// Cancel the active session (if any) and wait for it to exit.
    ///
    /// Already-processed items remain committed.
    pub async fn cancel_scan(&self) {
        self.request_cancel();
        let handle = self.inner.session.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Wait for the active session (if any) to finish on its own.
    pub async fn wait_for_scan(&self) {
        let handle = self.inner.session.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // =========================================================================
    // Background scan
    // =========================================================================

    /// Classify a small batch of items (e.g. freshly paged-in) without
    /// disturbing any active full-scan session.
    ///
    /// No pruning happens here — this path only adds knowledge. Items
    /// already scanned are skipped. One flush at the end of the batch.
    ///
    /// Returns the number of items newly classified.
    pub async fn scan_background(&self, items: &[MediaItem]) -> usize {
        let mut classified = 0;
        for item in items {
            if self.inner.state.lock().await.scanned.contains(&item.id) {
                continue;
            }
            let verdict = self.inner.probe.probe(&item.id, item.kind).await;
            let mut state = self.inner.state.lock().await;
            apply_verdict(&mut state, item, verdict);
            classified += 1;
        }
        if classified > 0 {
            let state = self.inner.state.lock().await;
            self.inner.flush(&state).await;
        }
        classified
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Reinstate an item that has reappeared in the visible library.
    ///
    /// With a remembered (pruned) classification this is free: the record
    /// moves back and no probe runs. Without one, the id is dropped from the
    /// scanned set so the next scan reclassifies it.
    ///
    /// Returns `true` if a remembered classification was restored.
    pub async fn restore(&self, item: &MediaItem) -> bool {
        let mut state = self.inner.state.lock().await;
        let restored = state.restore(item);
        self.inner.flush(&state).await;
        restored
    }

    // =========================================================================
    // Read surface
    // =========================================================================

    /// Whether the item is classified spatial. Never triggers a probe.
    pub async fn is_spatial(&self, id: &ItemId) -> bool {
        self.inner.state.lock().await.spatial.contains(id)
    }

    /// Whether the item has ever been classified (spatial or not).
    pub async fn has_been_scanned(&self, id: &ItemId) -> bool {
        self.inner.state.lock().await.scanned.contains(id)
    }

    /// Derived per-item status.
    pub async fn scan_state(&self, id: &ItemId) -> ScanState {
        self.inner.state.lock().await.scan_state(id)
    }

    /// Keep only the items classified spatial, preserving input order.
    pub async fn filter_spatial(&self, items: Vec<MediaItem>) -> Vec<MediaItem> {
        let state = self.inner.state.lock().await;
        items.into_iter().filter(|item| state.spatial.contains(&item.id)).collect()
    }

    /// Retained display metadata for a spatial item.
    pub async fn spatial_record(&self, id: &ItemId) -> Option<SpatialRecord> {
        self.inner.state.lock().await.spatial_records.get(id).cloned()
    }

    /// Cumulative count of items ever classified, across all sessions.
    pub async fn total_scanned(&self) -> usize {
        self.inner.state.lock().await.scanned.len()
    }

    /// Manual spatial override (e.g. the property was observed while
    /// rendering). Idempotent; flushes immediately.
    pub async fn mark_as_spatial(&self, id: &ItemId, metadata: Option<&MediaItem>) {
        let mut state = self.inner.state.lock().await;
        state.record_spatial_manual(id, metadata);
        self.inner.flush(&state).await;
    }

    /// Idempotent insert into the scanned set only. Does not flush — callers
    /// batch these and the next checkpoint picks them up.
    pub async fn mark_as_scanned(&self, id: &ItemId) {
        self.inner.state.lock().await.record_scanned(id);
    }

    /// Forget everything: cancel any session, empty all four sets, reset the
    /// timestamp, and persist the empty index.
    ///
    /// Unlike checkpoint flushes, a persistence failure here propagates —
    /// the caller asked for durable erasure and needs to know it didn't happen.
    pub async fn clear(&self) -> Result<()> {
        self.cancel_scan().await;
        let mut state = self.inner.state.lock().await;
        *state = IndexState::default();
        self.inner.store.clear().await
    }

    /// Snapshot of scan progress, pollable at any time.
    pub async fn progress(&self) -> ScanProgress {
        let last_scan = self.inner.state.lock().await.last_scan;
        self.inner.progress.snapshot(last_scan)
    }
}

/// Commit one probe verdict. A failed probe degrades to scanned-not-spatial
/// with no retry — preserving that behavior (rather than queueing a retry)
/// keeps a transient failure from blocking the session, at the cost of
/// under-classifying until the item is rescanned.
fn apply_verdict(state: &mut IndexState, item: &MediaItem, verdict: parallax_probe::error::Result<bool>) {
    match verdict {
        Ok(true) => state.record_spatial(item),
        Ok(false) => state.record_scanned(&item.id),
        Err(e) => {
            tracing::warn!(id = %item.id, error = ?e, "probe failed; marking scanned-not-spatial");
            state.record_scanned(&item.id);
        },
    }
}

/// The session task: probe each target item in order, committing and
/// checkpointing as it goes.
async fn run_session(inner: Arc<Inner>, to_scan: Vec<MediaItem>) {
    let interval = inner.settings.checkpoint_interval.max(1) as u64;
    let mut cancelled = false;
    for item in &to_scan {
        // Cancellation is honored between items; an in-flight probe always
        // runs to completion and its item is committed.
        if inner.cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let verdict = inner.probe.probe(&item.id, item.kind).await;
        let mut state = inner.state.lock().await;
        apply_verdict(&mut state, item, verdict);
        let processed = inner.progress.advance();
        if processed % interval == 0 {
            inner.flush(&state).await;
        }
    }
    let mut state = inner.state.lock().await;
    if !cancelled {
        state.last_scan = Some(OffsetDateTime::now_utc());
    }
    inner.flush(&state).await;
    drop(state);
    inner.progress.finish();
    tracing::debug!(cancelled, "scan session finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_catalog::{MediaKind, MockCatalog};
    use parallax_probe::MockProbe;
    use std::sync::OnceLock;

    fn item(id: &str, kind: MediaKind) -> MediaItem {
        MediaItem::new(id, kind, format!("{id}.bin"), OffsetDateTime::UNIX_EPOCH, OffsetDateTime::UNIX_EPOCH)
    }

    /// The visible set from the scan scenario: A(image), B(video), C(image).
    fn library() -> Vec<MediaItem> {
        vec![item("a", MediaKind::Image), item("b", MediaKind::Video), item("c", MediaKind::Image)]
    }

    /// probe(a) = true, probe(b) = false, probe(c) = true.
    fn abc_probe() -> MockProbe {
        MockProbe::default().with_verdict("a", true).with_verdict("c", true)
    }

    async fn index_with(probe: MockProbe) -> (SpatialIndex, Arc<MockProbe>, Database) {
        let db = Database::connect_in_memory().await.unwrap();
        let probe = Arc::new(probe);
        let handle: ProbeHandle = probe.clone();
        let index = SpatialIndex::load(&db, handle, ScanSettings::default()).await.unwrap();
        (index, probe, db)
    }

    /// A fresh index over the same database, as after a process restart.
    async fn reload(db: &Database) -> SpatialIndex {
        let probe: ProbeHandle = Arc::new(MockProbe::default());
        SpatialIndex::load(db, probe, ScanSettings::default()).await.unwrap()
    }

    /// `spatial ⊆ scanned`, and no id has a record in both metadata tables.
    async fn assert_invariants(index: &SpatialIndex) {
        let state = index.inner.state.lock().await;
        assert!(state.spatial.is_subset(&state.scanned));
        for id in state.spatial_records.keys() {
            assert!(!state.hidden_records.contains_key(id));
        }
    }

    #[tokio::test]
    async fn test_full_scan_classifies_visible_items() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        assert!(index.is_spatial(&"a".into()).await);
        assert!(!index.is_spatial(&"b".into()).await);
        assert!(index.is_spatial(&"c".into()).await);
        for id in ["a", "b", "c"] {
            assert!(index.has_been_scanned(&id.into()).await);
        }
        // Probed in input order.
        assert_eq!(probe.calls(), vec!["a".into(), "b".into(), "c".into()]);

        let progress = index.progress().await;
        assert_eq!((progress.processed, progress.total), (3, 3));
        assert_eq!(progress.fraction(), 1.0);
        assert!(!progress.is_scanning);
        assert!(progress.last_scan.is_some());
        assert_invariants(&index).await;
    }

    #[tokio::test]
    async fn test_rescan_of_unchanged_library_probes_nothing() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.call_count(), 3);

        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.call_count(), 3);
        assert!(!index.progress().await.is_scanning);
    }

    #[tokio::test]
    async fn test_cancellation_commits_partial_progress() {
        // The hook cancels from inside the probe of "a", so the session
        // commits exactly that one item and exits before touching "b".
        let slot: Arc<OnceLock<SpatialIndex>> = Arc::new(OnceLock::new());
        let hook = Arc::clone(&slot);
        let probe = abc_probe().with_hook(move |id| {
            if id.as_str() == "a" {
                hook.get().expect("index registered").request_cancel();
            }
        });
        let (index, probe, db) = index_with(probe).await;
        assert!(slot.set(index.clone()).is_ok());

        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        assert!(index.is_spatial(&"a".into()).await);
        assert!(!index.has_been_scanned(&"b".into()).await);
        assert!(!index.has_been_scanned(&"c".into()).await);
        assert_eq!(probe.call_count(), 1);
        let progress = index.progress().await;
        assert!(!progress.is_scanning);
        assert_eq!((progress.processed, progress.total), (1, 3));
        // A cancelled session does not count as a completed scan.
        assert_eq!(progress.last_scan, None);

        // Partial progress is durable.
        let restarted = reload(&db).await;
        assert!(restarted.is_spatial(&"a".into()).await);
        assert!(!restarted.has_been_scanned(&"b".into()).await);

        // Resuming probes only the remaining n - k items.
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.call_count(), 3);
        assert_eq!(probe.calls_for(&"a".into()), 1);
        assert!(index.is_spatial(&"c".into()).await);
        assert!(index.has_been_scanned(&"b".into()).await);
        assert_invariants(&index).await;
    }

    #[tokio::test]
    async fn test_restart_never_reprobes_committed_items() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        // Supersede the first session immediately: it is cancelled and
        // awaited, and whatever it committed is excluded from the new
        // session's targets.
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        assert_eq!(probe.call_count(), 3);
        assert!(index.is_spatial(&"a".into()).await);
        assert!(index.is_spatial(&"c".into()).await);
        assert!(index.has_been_scanned(&"b".into()).await);
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_to_not_spatial() {
        let probe = MockProbe::default().with_verdict("a", true).with_failure("b").with_verdict("c", true);
        let (index, probe, _db) = index_with(probe).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        assert_eq!(index.scan_state(&"b".into()).await, ScanState::ScannedNotSpatial);
        assert_eq!(index.progress().await.processed, 3);

        // No retry on the next scan: the failure was recorded as a verdict.
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.calls_for(&"b".into()), 1);
    }

    #[tokio::test]
    async fn test_prune_and_restore_round_trip() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        // "c" leaves the visible library; its classification is pruned but
        // remembered.
        index.start_scan(vec![item("a", MediaKind::Image), item("b", MediaKind::Video)]).await.unwrap();
        index.wait_for_scan().await;
        assert!(!index.is_spatial(&"c".into()).await);
        assert!(!index.has_been_scanned(&"c".into()).await);
        assert!(index.spatial_record(&"c".into()).await.is_none());
        assert!(index.is_spatial(&"a".into()).await);

        // "c" returns: the classification comes back with zero probe calls.
        assert!(index.restore(&item("c", MediaKind::Image)).await);
        assert!(index.is_spatial(&"c".into()).await);
        assert_eq!(index.spatial_record(&"c".into()).await.unwrap().file_name, "c.bin");
        assert_eq!(probe.calls_for(&"c".into()), 1);
        assert_eq!(probe.call_count(), 3);
        assert_invariants(&index).await;
    }

    #[tokio::test]
    async fn test_restore_without_history_forces_rescan() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        // "b" was scanned-not-spatial; restoring it revokes that verdict.
        assert!(!index.restore(&item("b", MediaKind::Video)).await);
        assert!(!index.has_been_scanned(&"b".into()).await);
        assert!(!index.is_spatial(&"b".into()).await);

        // The next scan reclassifies it.
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.calls_for(&"b".into()), 2);
        assert_eq!(probe.call_count(), 4);
    }

    #[tokio::test]
    async fn test_background_scan_adds_knowledge() {
        let (index, probe, db) = index_with(MockProbe::default().with_verdict("d", true)).await;
        let batch = [item("d", MediaKind::Video), item("e", MediaKind::Image)];

        assert_eq!(index.scan_background(&batch).await, 2);
        assert!(index.is_spatial(&"d".into()).await);
        assert_eq!(index.scan_state(&"e".into()).await, ScanState::ScannedNotSpatial);

        // The batch flushed once at the end.
        let restarted = reload(&db).await;
        assert!(restarted.is_spatial(&"d".into()).await);

        // A second batch over the same items probes nothing.
        assert_eq!(index.scan_background(&batch).await, 0);
        assert_eq!(probe.call_count(), 2);
    }

    #[tokio::test]
    async fn test_background_scan_does_not_disturb_full_scan() {
        let (index, probe, _db) = index_with(abc_probe().with_verdict("d", true)).await;
        index.start_scan(library()).await.unwrap();
        let classified = index.scan_background(&[item("d", MediaKind::Video)]).await;
        index.wait_for_scan().await;

        assert_eq!(classified, 1);
        // Session counters reflect only the full scan's targets.
        assert_eq!(index.progress().await.total, 3);
        assert_eq!(index.total_scanned().await, 4);
        assert_eq!(probe.call_count(), 4);
        assert!(index.is_spatial(&"d".into()).await);
        // The full scan ran to natural completion.
        assert!(index.progress().await.last_scan.is_some());
        assert_invariants(&index).await;
    }

    #[tokio::test]
    async fn test_flush_failure_keeps_memory_authoritative() {
        let (index, probe, db) = index_with(abc_probe()).await;
        // Every flush from here on fails; the scan must carry on regardless
        // and the read surface answers from memory.
        db.close().await;

        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        assert_eq!(probe.call_count(), 3);
        assert!(index.is_spatial(&"a".into()).await);
        assert!(index.has_been_scanned(&"b".into()).await);
        assert!(!index.is_spatial(&"b".into()).await);
        assert!(index.is_spatial(&"c".into()).await);
        let progress = index.progress().await;
        assert!(!progress.is_scanning);
        assert_eq!((progress.processed, progress.total), (3, 3));
        assert_invariants(&index).await;
    }

    #[tokio::test]
    async fn test_mark_as_spatial_flushes_immediately() {
        let (index, _probe, db) = index_with(MockProbe::default()).await;
        let d = item("d", MediaKind::Image);
        index.mark_as_spatial(&d.id, Some(&d)).await;

        assert!(index.is_spatial(&d.id).await);
        assert_eq!(index.spatial_record(&d.id).await.unwrap().file_name, "d.bin");

        let restarted = reload(&db).await;
        assert!(restarted.is_spatial(&d.id).await);
        assert!(restarted.has_been_scanned(&d.id).await);
    }

    #[tokio::test]
    async fn test_mark_as_scanned_defers_flush() {
        let (index, _probe, db) = index_with(MockProbe::default()).await;
        index.mark_as_scanned(&"e".into()).await;
        assert!(index.has_been_scanned(&"e".into()).await);

        // Not durable yet; the next checkpoint will pick it up.
        let restarted = reload(&db).await;
        assert!(!restarted.has_been_scanned(&"e".into()).await);
    }

    #[tokio::test]
    async fn test_clear_forgets_everything() {
        let (index, _probe, db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;
        assert!(index.progress().await.last_scan.is_some());

        index.clear().await.unwrap();
        assert!(!index.is_spatial(&"a".into()).await);
        assert_eq!(index.total_scanned().await, 0);
        assert_eq!(index.progress().await.last_scan, None);

        let restarted = reload(&db).await;
        assert_eq!(restarted.total_scanned().await, 0);
    }

    #[tokio::test]
    async fn test_filter_spatial_preserves_input_order() {
        let (index, _probe, _db) = index_with(abc_probe()).await;
        index.start_scan(library()).await.unwrap();
        index.wait_for_scan().await;

        let shuffled = vec![item("c", MediaKind::Image), item("b", MediaKind::Video), item("a", MediaKind::Image)];
        let filtered = index.filter_spatial(shuffled).await;
        let ids: Vec<_> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[tokio::test]
    async fn test_refresh_from_catalog() {
        let (index, probe, _db) = index_with(abc_probe()).await;
        let catalog = Arc::new(MockCatalog::with_items(library()));
        let handle: CatalogHandle = catalog.clone();

        index.refresh_from(&handle).await.unwrap();
        index.wait_for_scan().await;
        assert_eq!(probe.call_count(), 3);
        assert!(index.is_spatial(&"c".into()).await);

        // "c" is hidden on the remote end; the next refresh prunes it.
        catalog.set_items([item("a", MediaKind::Image), item("b", MediaKind::Video)]).await;
        index.refresh_from(&handle).await.unwrap();
        index.wait_for_scan().await;
        assert!(!index.is_spatial(&"c".into()).await);
        assert_eq!(probe.call_count(), 3);
        assert_invariants(&index).await;
    }
}
