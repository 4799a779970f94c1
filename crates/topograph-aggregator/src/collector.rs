use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use topograph_core::{Node, NodeControlData, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSeen {
    pub at: OffsetDateTime,
    /// Window of the probe's latest report.
    pub window: Duration,
}

/// The accumulated snapshot every render reads from.
///
/// The current report sits behind one atomically swapped pointer: writers
/// merge into a fresh report and swap it in, readers grab whatever snapshot
/// is visible and never wait on ingestion. Writers serialize on `probes`.
pub struct Collector {
    current: ArcSwap<Report>,
    probes: Mutex<BTreeMap<String, ProbeSeen>>,
    expiry: Duration,
    shortcuts: watch::Sender<u64>,
}

impl Collector {
    pub fn new(expiry: Duration) -> Self {
        let (shortcuts, _) = watch::channel(0);
        Self {
            current: ArcSwap::from_pointee(Report::default()),
            probes: Mutex::new(BTreeMap::new()),
            expiry,
            shortcuts,
        }
    }

    pub fn report(&self) -> Arc<Report> {
        self.current.load_full()
    }

    /// Bumped whenever a shortcut report lands.
    pub fn shortcuts(&self) -> watch::Receiver<u64> {
        self.shortcuts.subscribe()
    }

    pub fn add(&self, probe_id: &str, report: &Report) {
        self.add_at(probe_id, report, OffsetDateTime::now_utc());
    }

    pub fn add_at(&self, probe_id: &str, report: &Report, now: OffsetDateTime) {
        let stamped = report.with_origin(probe_id, now);
        {
            let mut probes = self.probes.lock();
            probes.insert(
                probe_id.to_string(),
                ProbeSeen {
                    at: now,
                    window: report.window,
                },
            );
            self.current.rcu(|current| Arc::new(current.merge(&stamped)));
        }
        tracing::debug!(probe_id, nodes = report.node_count(), "report merged");

        if report.shortcut {
            self.shortcuts.send_modify(|generation| *generation += 1);
        }
    }

    /// Forgets probes not heard from within the expiry window and drops the
    /// nodes only they vouched for. A node a live probe has stopped sending
    /// loses that origin once the probe's report window has passed since it
    /// was last sent. Returns the pruned probe IDs.
    pub fn prune(&self, now: OffsetDateTime) -> BTreeSet<String> {
        let mut probes = self.probes.lock();
        let cutoff = now - self.expiry;
        let stale: BTreeSet<String> = probes
            .iter()
            .filter(|(_, seen)| seen.at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        probes.retain(|id, _| !stale.contains(id));

        // Only origins superseded by a newer report from the same probe age out.
        let expired = |probe_id: &str, seen: OffsetDateTime| {
            probes.get(probe_id).is_some_and(|probe| {
                seen < probe.at && seen < now - probe.window.min(self.expiry)
            })
        };
        let previous = self
            .current
            .rcu(|current| Arc::new(current.prune_origins(&stale, &expired)));
        let aged = previous
            .node_count()
            .saturating_sub(self.current.load().node_count());
        drop(probes);

        if !stale.is_empty() {
            tracing::info!(probes = ?stale, "pruned stale probes");
        }
        if aged > 0 {
            tracing::debug!(nodes = aged, "aged out unreported nodes");
        }
        stale
    }

    /// Records that `control` can no longer act on `node_id`.
    pub fn mark_control_dead(&self, node_id: &str, control: &str, now: OffsetDateTime) {
        self.current.rcu(|current| {
            let Some((kind, node)) = current.node(node_id) else {
                return Arc::clone(current);
            };
            let mut delta = Report::default();
            delta.topology_mut(kind).add_node(
                Node::new(node_id)
                    .with_topology(node.topology.clone())
                    .with_latest_control(control, now, NodeControlData { dead: true }),
            );
            Arc::new(current.merge(&delta))
        });
    }

    #[cfg(test)]
    pub fn probes(&self) -> BTreeMap<String, ProbeSeen> {
        self.probes.lock().clone()
    }
}
