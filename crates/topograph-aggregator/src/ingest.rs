use std::sync::Arc;
use tokio::sync::mpsc;

use crate::collector::Collector;
use crate::control::ControlRouter;
use crate::net::{ProbeEvent, ProbeEventKind};

/// Applies probe events to the collector and the control router until every
/// link has gone away.
pub async fn pump(
    mut events: mpsc::Receiver<ProbeEvent>,
    collector: Arc<Collector>,
    router: Arc<ControlRouter>,
) {
    while let Some(event) = events.recv().await {
        apply(&collector, &router, event);
    }
    tracing::info!("probe event channel closed");
}

fn apply(collector: &Collector, router: &ControlRouter, event: ProbeEvent) {
    let endpoint = event.endpoint.as_str();
    match event.kind {
        ProbeEventKind::Connected { probe_id } => {
            tracing::info!(endpoint, probe_id = %probe_id, "probe link up");
        }
        ProbeEventKind::Disconnected { probe_id } => {
            if let Some(probe_id) = probe_id {
                router.fail_probe(&probe_id);
                tracing::info!(endpoint, probe_id = %probe_id, "probe link down");
            }
        }
        ProbeEventKind::Report { probe_id, report } => collector.add(&probe_id, &report),
        ProbeEventKind::ControlReply { request_id, reply } => router.complete(&request_id, reply),
        ProbeEventKind::Error(err) => {
            tracing::debug!(endpoint, error = %err, "probe link error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ProbeLinks;
    use std::time::Duration;
    use topograph_core::{ids, Node, Report, TopologyKind};

    #[tokio::test]
    async fn reports_reach_the_collector() {
        let collector = Arc::new(Collector::new(Duration::from_secs(60)));
        let router = Arc::new(ControlRouter::new(
            Arc::clone(&collector),
            ProbeLinks::new(),
            Duration::from_millis(50),
            true,
        ));
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(pump(rx, Arc::clone(&collector), router));

        let mut report = Report::new("probe-a");
        report
            .topology_mut(TopologyKind::Host)
            .add_node(Node::new(ids::make_host_node_id("h1")).with_topology("host"));
        tx.send(ProbeEvent::connected("local", "probe-a".into()))
            .await
            .expect("send");
        tx.send(ProbeEvent::report("local", "probe-a".into(), report))
            .await
            .expect("send");
        tx.send(ProbeEvent::disconnected("local", Some("probe-a".into())))
            .await
            .expect("send");
        drop(tx);
        task.await.expect("pump");

        let current = collector.report();
        let (_, node) = current
            .node(&ids::make_host_node_id("h1"))
            .expect("host merged");
        assert!(node.origins().is_some_and(|o| o.contains("probe-a")));
        assert!(collector.probes().contains_key("probe-a"));
    }
}
