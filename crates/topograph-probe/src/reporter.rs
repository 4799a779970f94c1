use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{broadcast, RwLock};
use topograph_core::{Msg, Report};

use crate::inventory::Inventory;
use crate::resources::{register_topologies, ProduceContext, Producer, Resource};

pub fn build_report(
    probe_id: &str,
    window: Duration,
    resources: &[Resource],
    now: OffsetDateTime,
) -> Report {
    let mut report = Report::new(probe_id);
    report.window = window;
    register_topologies(&mut report);

    let ctx = ProduceContext {
        probe_id: probe_id.to_string(),
        now,
    };
    for resource in resources {
        report
            .topology_mut(resource.topology())
            .add_node(resource.node(&ctx));
    }
    report
}

/// Owns the inventory and publishes reports built from it on the bus.
#[derive(Clone)]
pub struct Reporter {
    probe_id: String,
    window: Duration,
    inventory: Arc<RwLock<Inventory>>,
    bus: broadcast::Sender<Msg>,
}

impl Reporter {
    pub fn new(
        probe_id: String,
        window: Duration,
        inventory: Inventory,
        bus: broadcast::Sender<Msg>,
    ) -> Self {
        Self {
            probe_id,
            window,
            inventory: Arc::new(RwLock::new(inventory)),
            bus,
        }
    }

    pub fn probe_id(&self) -> &str {
        &self.probe_id
    }

    pub fn inventory(&self) -> &Arc<RwLock<Inventory>> {
        &self.inventory
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Msg> {
        self.bus.subscribe()
    }

    pub async fn report(&self, shortcut: bool) -> Report {
        let inventory = self.inventory.read().await;
        let mut report = build_report(
            &self.probe_id,
            self.window,
            &inventory.resources,
            OffsetDateTime::now_utc(),
        );
        report.shortcut = shortcut;
        report
    }

    pub async fn publish(&self, shortcut: bool) {
        let report = self.report(shortcut).await;
        tracing::debug!(nodes = report.node_count(), shortcut, "publishing report");
        // no connected aggregator is fine
        let _ = self.bus.send(Msg::Report { report });
    }

    pub async fn replace_inventory(&self, inventory: Inventory) {
        let count = inventory.resources.len();
        *self.inventory.write().await = inventory;
        tracing::info!(resources = count, "inventory reloaded");
        self.publish(true).await;
    }

    pub async fn run(self, interval: Duration) {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.publish(false).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{CStorPool, ObjectMeta, DELETE_POD};
    use time::macros::datetime;
    use topograph_core::{ids, TopologyKind};

    fn pool(uid: &str) -> Resource {
        Resource::CStorPool(CStorPool {
            api_version: "openebs.io/v1alpha1".to_string(),
            metadata: ObjectMeta {
                name: format!("pool-{uid}"),
                uid: uid.to_string(),
                ..ObjectMeta::default()
            },
        })
    }

    #[test]
    fn report_files_nodes_under_their_topology() {
        let report = build_report(
            "probe-1",
            Duration::from_secs(15),
            &[pool("a"), pool("b")],
            datetime!(2024-06-01 10:00:00 UTC),
        );

        let pools = &report.topology(TopologyKind::CstorPool).nodes;
        assert_eq!(pools.len(), 2);
        assert!(pools.contains(&ids::make_cstor_pool_node_id("a")));
        assert_eq!(report.node_count(), 2);
        assert!(report.probes.contains("probe-1"));
        assert_eq!(report.window, Duration::from_secs(15));
        assert!(report
            .topology(TopologyKind::Pod)
            .controls
            .get(DELETE_POD)
            .is_some());
    }

    #[tokio::test]
    async fn replacing_inventory_publishes_shortcut() {
        let (bus, _) = broadcast::channel(8);
        let reporter = Reporter::new(
            "probe-1".to_string(),
            Duration::from_secs(15),
            Inventory::default(),
            bus,
        );
        let mut rx = reporter.subscribe();

        reporter
            .replace_inventory(Inventory {
                resources: vec![pool("a")],
            })
            .await;

        match rx.recv().await.expect("report published") {
            Msg::Report { report } => {
                assert!(report.shortcut);
                assert_eq!(report.node_count(), 1);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
