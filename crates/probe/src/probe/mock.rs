//! Scripted probe for testing.

use super::SpatialProbe;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use parallax_catalog::{ItemId, MediaKind};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

type ProbeHook = Box<dyn Fn(&ItemId) + Send + Sync>;

/// Scripted probe for testing.
///
/// Verdicts and failures are configured up front per item id; every call is
/// recorded so tests can assert *exact* probe invocation counts, which is how
/// the index's idempotence and resumability guarantees are verified. Items
/// with no scripted verdict report not-spatial.
///
/// An optional hook runs inside each `probe` call (after the call is
/// recorded, before the verdict is returned). Tests use it to trigger
/// cancellation at a deterministic point mid-scan.
#[derive(Default)]
pub struct MockProbe {
    verdicts: HashMap<ItemId, bool>,
    failures: HashSet<ItemId>,
    calls: Mutex<Vec<ItemId>>,
    hook: Option<ProbeHook>,
}

impl MockProbe {
    /// Script a verdict for an item.
    pub fn with_verdict(mut self, id: impl Into<ItemId>, spatial: bool) -> Self {
        self.verdicts.insert(id.into(), spatial);
        self
    }

    /// Script a fetch failure for an item.
    pub fn with_failure(mut self, id: impl Into<ItemId>) -> Self {
        self.failures.insert(id.into());
        self
    }

    /// Run `hook` inside every `probe` call.
    pub fn with_hook(mut self, hook: impl Fn(&ItemId) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Every id probed so far, in call order.
    pub fn calls(&self) -> Vec<ItemId> {
        self.calls.lock().unwrap().clone()
    }

    /// Total number of probe calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of probe calls for one item.
    pub fn calls_for(&self, id: &ItemId) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }
}

#[async_trait]
impl SpatialProbe for MockProbe {
    async fn probe(&self, id: &ItemId, _kind: MediaKind) -> Result<bool> {
        self.calls.lock().unwrap().push(id.clone());
        if let Some(hook) = &self.hook {
            hook(id);
        }
        if self.failures.contains(id) {
            exn::bail!(ErrorKind::Fetch(format!("scripted failure for {id}")));
        }
        Ok(self.verdicts.get(id).copied().unwrap_or(false))
    }
}
