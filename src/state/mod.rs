use crate::merge::attach_artifact;
use crate::wire::{ImageArtifact, LeafAddress, Plan};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Identifies one top-level generation request. A newer request supersedes
/// every older token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationToken(u64);

struct Inner {
    generation: u64,
    current: Option<Arc<Plan>>,
}

/// Owner of the current plan snapshot. Snapshots are replaced wholesale by a
/// new generation or merged at a single leaf; every change is published to
/// subscribers.
pub struct PlanStore {
    inner: Mutex<Inner>,
    tx: watch::Sender<Option<Arc<Plan>>>,
}

impl Default for PlanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Mutex::new(Inner { generation: 0, current: None }), tx }
    }

    /// Start a new generation: older tokens stop being current and the
    /// previous plan (with its enrichment progress) is dropped.
    pub fn begin_generation(&self) -> GenerationToken {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.current = None;
        self.tx.send_replace(None);
        GenerationToken(inner.generation)
    }

    /// Publish a freshly parsed plan. Returns `None` if `token` has been
    /// superseded meanwhile.
    pub fn install(&self, token: GenerationToken, plan: Plan) -> Option<Arc<Plan>> {
        let mut inner = self.inner.lock();
        if inner.generation != token.0 {
            return None;
        }
        let plan = Arc::new(plan);
        inner.current = Some(Arc::clone(&plan));
        self.tx.send_replace(Some(Arc::clone(&plan)));
        Some(plan)
    }

    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.inner.lock().generation == token.0
    }

    pub fn snapshot(&self) -> Option<Arc<Plan>> {
        self.inner.lock().current.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Plan>>> {
        self.tx.subscribe()
    }

    /// Attach an artifact to the current plan. Returns whether a new snapshot
    /// was published; a stale address leaves the state untouched.
    pub fn merge(&self, address: &LeafAddress, artifact: ImageArtifact) -> bool {
        let mut inner = self.inner.lock();
        let Some(current) = inner.current.as_ref() else {
            return false;
        };
        let next = attach_artifact(current, address, artifact);
        if Arc::ptr_eq(current, &next) {
            return false;
        }
        inner.current = Some(Arc::clone(&next));
        self.tx.send_replace(Some(next));
        true
    }
}
