use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use topograph_core::Msg;

/// Outbound channels of the currently connected probes, keyed by probe ID.
#[derive(Debug, Clone, Default)]
pub struct ProbeLinks {
    inner: Arc<RwLock<BTreeMap<String, mpsc::Sender<Msg>>>>,
}

impl ProbeLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reconnecting probe replaces its previous link.
    pub fn register(&self, probe_id: &str, tx: mpsc::Sender<Msg>) {
        self.inner.write().insert(probe_id.to_string(), tx);
    }

    /// Removes the link only if it is still `tx`, so a stale connection
    /// closing late cannot drop its replacement.
    pub fn unregister(&self, probe_id: &str, tx: &mpsc::Sender<Msg>) {
        let mut links = self.inner.write();
        if links.get(probe_id).is_some_and(|cur| cur.same_channel(tx)) {
            links.remove(probe_id);
        }
    }

    pub fn sender(&self, probe_id: &str) -> Option<mpsc::Sender<Msg>> {
        self.inner.read().get(probe_id).cloned()
    }
}
