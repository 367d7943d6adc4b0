//! Progress accounting for scan sessions.
//!
//! Session progress (`processed` of `total`) is deliberately separate from
//! the cumulative ever-scanned count (`|scanned-ids|`); conflating the two
//! double-counts across session boundaries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use time::OffsetDateTime;

/// Read-only snapshot of scan progress, safe to poll from any task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// Items processed in the current (or last) session.
    pub processed: u64,
    /// Items targeted by the current (or last) session.
    pub total: u64,
    pub is_scanning: bool,
    /// When the last full scan ran to natural completion.
    pub last_scan: Option<OffsetDateTime>,
}

impl ScanProgress {
    /// Session completion in `0.0..=1.0`. A session over zero items counts
    /// as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Live counters published by the session task, read lock-free by pollers.
#[derive(Debug, Default)]
pub(crate) struct ProgressCounters {
    processed: AtomicU64,
    total: AtomicU64,
    scanning: AtomicBool,
}

impl ProgressCounters {
    pub(crate) fn begin(&self, total: u64) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.scanning.store(true, Ordering::Relaxed);
    }

    /// Bump the processed count, returning the new value.
    pub(crate) fn advance(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn finish(&self) {
        self.scanning.store(false, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, last_scan: Option<OffsetDateTime>) -> ScanProgress {
        ScanProgress {
            processed: self.processed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            is_scanning: self.scanning.load(Ordering::Relaxed),
            last_scan,
        }
    }
}
