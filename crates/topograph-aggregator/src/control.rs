use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use topograph_core::{
    keys, ControlError, ControlOutput, ControlReply, ControlRequest, Msg, Node,
};

use crate::collector::Collector;
use crate::net::ProbeLinks;

struct Pending {
    probe_id: String,
    reply: oneshot::Sender<ControlReply>,
}

/// Routes control invocations to the probe that owns the target node.
pub struct ControlRouter {
    collector: Arc<Collector>,
    links: ProbeLinks,
    pending: Mutex<HashMap<String, Pending>>,
    timeout: Duration,
    admin_controls: bool,
}

/// Probe that reported the node and may act on it.
fn owning_probe(node: &Node) -> Option<String> {
    node.lookup(keys::CONTROL_PROBE_ID)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| node.origins().and_then(|o| o.iter().next().cloned()))
}

impl ControlRouter {
    pub fn new(
        collector: Arc<Collector>,
        links: ProbeLinks,
        timeout: Duration,
        admin_controls: bool,
    ) -> Self {
        Self {
            collector,
            links,
            pending: Mutex::new(HashMap::new()),
            timeout,
            admin_controls,
        }
    }

    /// Runs `control` against `node_id`. A failure is reported once and
    /// never retried.
    pub async fn invoke(
        &self,
        node_id: &str,
        control: &str,
        confirmation: Option<&str>,
    ) -> Result<ControlOutput, ControlError> {
        let (probe_id, request) = self.prepare(node_id, control, confirmation)?;
        let request_id = request.request_id.clone();

        let Some(link) = self.links.sender(&probe_id) else {
            return Err(ControlError::ProbeUnavailable(probe_id));
        };
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            request_id.clone(),
            Pending {
                probe_id: probe_id.clone(),
                reply: tx,
            },
        );
        if link.send(Msg::ControlRequest { request }).await.is_err() {
            self.pending.lock().remove(&request_id);
            return Err(ControlError::ProbeUnavailable(probe_id));
        }
        tracing::info!(node_id, control, probe_id = %probe_id, request_id = %request_id, "control sent");

        let result = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply.into_result(),
            Ok(Err(_)) => Err(ControlError::ProbeUnavailable(probe_id)),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(ControlError::Timeout(
                    u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        };

        if let Err(err) = &result {
            tracing::warn!(node_id, control, error = %err, "control failed");
            if err.is_target_gone() {
                self.collector
                    .mark_control_dead(node_id, control, OffsetDateTime::now_utc());
            }
        }
        result
    }

    /// Checks everything that can be decided without the probe.
    fn prepare(
        &self,
        node_id: &str,
        control: &str,
        confirmation: Option<&str>,
    ) -> Result<(String, ControlRequest), ControlError> {
        let report = self.collector.report();
        let Some((kind, node)) = report.node(node_id) else {
            return Err(ControlError::NotFound(node_id.to_string()));
        };
        let Some(definition) = report.topology(kind).controls.get(control) else {
            return Err(ControlError::Failed(format!(
                "{kind} does not offer control {control}"
            )));
        };
        if node
            .latest_controls
            .lookup(control)
            .is_some_and(|state| state.dead)
        {
            return Err(ControlError::NotFound(format!(
                "{control} no longer applies to {node_id}"
            )));
        }
        if !node.active_controls().any(|c| c == control) {
            return Err(ControlError::Denied(format!(
                "{control} is not active on {node_id}"
            )));
        }
        if definition.is_admin() && !self.admin_controls {
            return Err(ControlError::Denied(format!(
                "{control} requires admin controls"
            )));
        }
        if definition.confirmation.is_some() && confirmation.map_or(true, str::is_empty) {
            return Err(ControlError::ConfirmationRequired(control.to_string()));
        }
        let Some(probe_id) = owning_probe(node) else {
            return Err(ControlError::ProbeUnavailable(format!(
                "no probe owns {node_id}"
            )));
        };

        let request = ControlRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
            control: control.to_string(),
        };
        Ok((probe_id, request))
    }

    /// Hands a probe's reply to the waiting caller; late replies are dropped.
    pub fn complete(&self, request_id: &str, reply: ControlReply) {
        match self.pending.lock().remove(request_id) {
            Some(pending) => {
                let _ = pending.reply.send(reply);
            }
            None => tracing::debug!(request_id, "reply for unknown or expired request"),
        }
    }

    /// Fails every request still waiting on `probe_id`.
    pub fn fail_probe(&self, probe_id: &str) {
        let mut pending = self.pending.lock();
        let ids: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.probe_id == probe_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(p) = pending.remove(&id) {
                let _ = p.reply.send(ControlReply::Failed {
                    reason: format!("probe {probe_id} disconnected"),
                });
            }
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use tokio::sync::mpsc;
    use topograph_core::{ids, Control, Controls, Report, TopologyKind, ADMIN_CONTROL};

    fn ts() -> OffsetDateTime {
        datetime!(2024-07-01 00:00:00 UTC)
    }

    fn control(id: &str, category: &str, confirmation: Option<&str>) -> Control {
        Control {
            id: id.to_string(),
            human: id.to_string(),
            category: category.to_string(),
            icon: String::new(),
            confirmation: confirmation.map(str::to_string),
            rank: 0,
        }
    }

    fn pod_id() -> String {
        ids::make_pod_node_id("p1")
    }

    fn collector() -> Arc<Collector> {
        let controls: Controls = [
            control("get_logs", "", None),
            control("describe", "", None),
            control("delete_pod", ADMIN_CONTROL, Some("Delete?")),
        ]
        .into_iter()
        .collect();
        let mut report = Report::new("probe-a");
        let pods = report.topology_mut(TopologyKind::Pod);
        *pods = pods.clone().with_controls(&controls);
        pods.add_node(
            Node::new(pod_id())
                .with_topology("pod")
                .with_latest(keys::CONTROL_PROBE_ID, ts(), "probe-a")
                .with_latest_active_controls(ts(), ["get_logs", "delete_pod"]),
        );
        let collector = Arc::new(Collector::new(Duration::from_secs(60)));
        collector.add_at("probe-a", &report, ts());
        collector
    }

    fn router(admin: bool) -> (ControlRouter, mpsc::Receiver<Msg>, Arc<Collector>) {
        let collector = collector();
        let links = ProbeLinks::new();
        let (tx, rx) = mpsc::channel(4);
        links.register("probe-a", tx);
        let router = ControlRouter::new(
            Arc::clone(&collector),
            links,
            Duration::from_millis(100),
            admin,
        );
        (router, rx, collector)
    }

    /// Answers the next request on the fake link with `reply`.
    async fn answer(router: &ControlRouter, rx: &mut mpsc::Receiver<Msg>, reply: ControlReply) {
        match rx.recv().await {
            Some(Msg::ControlRequest { request }) => {
                assert_eq!(request.node_id, pod_id());
                router.complete(&request.request_id, reply);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_control_returns_output() {
        let id = pod_id();
        let (router, mut rx, _) = router(true);
        let (result, ()) = tokio::join!(
            router.invoke(&id, "get_logs", None),
            answer(
                &router,
                &mut rx,
                ControlReply::Ok {
                    output: Some("line".into())
                }
            ),
        );
        assert_eq!(result.expect("ok").output.as_deref(), Some("line"));
        assert_eq!(router.pending(), 0);
    }

    #[tokio::test]
    async fn local_checks_reject_before_sending() {
        let (router, mut rx, _) = router(false);

        let missing = router.invoke("ghost;<pod>", "get_logs", None).await;
        assert!(matches!(missing, Err(ControlError::NotFound(_))));

        let unknown = router.invoke(&pod_id(), "reboot", None).await;
        assert!(matches!(unknown, Err(ControlError::Failed(_))));

        let inactive = router.invoke(&pod_id(), "describe", None).await;
        assert!(matches!(inactive, Err(ControlError::Denied(_))));

        let admin = router.invoke(&pod_id(), "delete_pod", Some("yes")).await;
        assert!(matches!(admin, Err(ControlError::Denied(_))));

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn confirmation_is_required_for_confirmed_controls() {
        let (router, _rx, _) = router(true);
        let result = router.invoke(&pod_id(), "delete_pod", None).await;
        assert_eq!(
            result,
            Err(ControlError::ConfirmationRequired("delete_pod".into()))
        );
    }

    #[tokio::test]
    async fn silent_probe_times_out() {
        let (router, _rx, _) = router(true);
        let result = router.invoke(&pod_id(), "get_logs", None).await;
        assert_eq!(result, Err(ControlError::Timeout(100)));
        assert_eq!(router.pending(), 0);
    }

    #[tokio::test]
    async fn not_found_marks_control_dead() {
        let id = pod_id();
        let (router, mut rx, collector) = router(true);
        let (result, ()) = tokio::join!(
            router.invoke(&id, "get_logs", None),
            answer(
                &router,
                &mut rx,
                ControlReply::NotFound {
                    reason: "gone".into()
                }
            ),
        );
        assert!(matches!(result, Err(ControlError::NotFound(_))));

        let report = collector.report();
        let (_, node) = report.node(&pod_id()).expect("node");
        assert!(!node.active_controls().any(|c| c == "get_logs"));

        let again = router.invoke(&pod_id(), "get_logs", None).await;
        assert!(matches!(again, Err(ControlError::NotFound(_))));
    }

    #[tokio::test]
    async fn disconnected_probe_is_unavailable() {
        let collector = collector();
        let router = ControlRouter::new(
            Arc::clone(&collector),
            ProbeLinks::new(),
            Duration::from_millis(100),
            true,
        );
        let result = router.invoke(&pod_id(), "get_logs", None).await;
        assert_eq!(result, Err(ControlError::ProbeUnavailable("probe-a".into())));
    }

    #[tokio::test]
    async fn fail_probe_releases_waiters() {
        let id = pod_id();
        let (router, mut rx, _) = router(true);
        let fail = async {
            let _ = rx.recv().await;
            router.fail_probe("probe-a");
        };
        let (result, ()) = tokio::join!(router.invoke(&id, "get_logs", None), fail);
        assert!(matches!(result, Err(ControlError::Failed(_))));
    }
}
