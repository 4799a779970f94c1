//! Report data model and its merge algebra.
//!
//! Every container here merges purely: `merge` borrows both sides and returns
//! a fresh value, and is commutative, associative and idempotent (the
//! controls registry is the one documented exception on colliding IDs). The
//! aggregator relies on this to apply reports in any order, any number of
//! times.

mod controls;
mod counters;
mod id_list;
pub mod ids;
pub mod keys;
mod latest;
mod merge;
mod node;
mod nodes;
mod sets;
mod templates;
mod topology;

pub use controls::{
    Control, ControlError, ControlOutput, ControlReply, ControlRequest, Controls,
    NodeControlData, ADMIN_CONTROL, READ_ONLY_CONTROL,
};
pub use counters::Counters;
pub use id_list::IdList;
pub use latest::{LatestEntry, LatestMap, NodeControlDataLatestMap, StringLatestMap};
pub use node::Node;
pub use nodes::Nodes;
pub use sets::{Sets, StringSet};
pub use templates::{
    MetadataRow, MetadataSource, MetadataTemplate, MetadataTemplates, Table, TableRow,
    TableTemplate, TableTemplates,
};
pub use topology::Topology;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

/// The fixed topology slots of a report, one per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    Process,
    Container,
    ContainerImage,
    Host,
    Pod,
    Service,
    Deployment,
    DaemonSet,
    StatefulSet,
    PersistentVolume,
    PersistentVolumeClaim,
    StorageClass,
    CstorVolume,
    CstorVolumeReplica,
    CstorPool,
}

impl TopologyKind {
    pub const ALL: [TopologyKind; 15] = [
        TopologyKind::Process,
        TopologyKind::Container,
        TopologyKind::ContainerImage,
        TopologyKind::Host,
        TopologyKind::Pod,
        TopologyKind::Service,
        TopologyKind::Deployment,
        TopologyKind::DaemonSet,
        TopologyKind::StatefulSet,
        TopologyKind::PersistentVolume,
        TopologyKind::PersistentVolumeClaim,
        TopologyKind::StorageClass,
        TopologyKind::CstorVolume,
        TopologyKind::CstorVolumeReplica,
        TopologyKind::CstorPool,
    ];

    /// Topology name; also the tag embedded in node IDs.
    pub fn as_str(self) -> &'static str {
        match self {
            TopologyKind::Process => "process",
            TopologyKind::Container => "container",
            TopologyKind::ContainerImage => "container_image",
            TopologyKind::Host => "host",
            TopologyKind::Pod => "pod",
            TopologyKind::Service => "service",
            TopologyKind::Deployment => "deployment",
            TopologyKind::DaemonSet => "daemon_set",
            TopologyKind::StatefulSet => "stateful_set",
            TopologyKind::PersistentVolume => "persistent_volume",
            TopologyKind::PersistentVolumeClaim => "persistent_volume_claim",
            TopologyKind::StorageClass => "storage_class",
            TopologyKind::CstorVolume => "cstor_volume",
            TopologyKind::CstorVolumeReplica => "cstor_volume_replica",
            TopologyKind::CstorPool => "cstor_pool",
        }
    }

    pub fn from_node_id(id: &str) -> Option<TopologyKind> {
        let (_, tag) = ids::parse_node_id(id)?;
        tag.parse().ok()
    }

    /// Empty topology carrying this kind's display shape and labels.
    pub fn empty_topology(self) -> Topology {
        let (shape, label, plural) = match self {
            TopologyKind::Process => ("square", "process", "processes"),
            TopologyKind::Container => ("hexagon", "container", "containers"),
            TopologyKind::ContainerImage => ("hexagon", "image", "images"),
            TopologyKind::Host => ("circle", "host", "hosts"),
            TopologyKind::Pod => ("heptagon", "pod", "pods"),
            TopologyKind::Service => ("heptagon", "service", "services"),
            TopologyKind::Deployment => ("heptagon", "deployment", "deployments"),
            TopologyKind::DaemonSet => ("pentagon", "daemonset", "daemonsets"),
            TopologyKind::StatefulSet => ("octagon", "statefulset", "statefulsets"),
            TopologyKind::PersistentVolume => ("cylinder", "PV", "PVs"),
            TopologyKind::PersistentVolumeClaim => ("dottedcylinder", "PVC", "PVCs"),
            TopologyKind::StorageClass => ("storagesheet", "storage class", "storage classes"),
            TopologyKind::CstorVolume => ("cylinder", "cStor volume", "cStor volumes"),
            TopologyKind::CstorVolumeReplica => {
                ("dottedcylinder", "cStor volume replica", "cStor volume replicas")
            }
            TopologyKind::CstorPool => ("storagesheet", "cStor pool", "cStor pools"),
        };
        Topology::new().with_shape(shape).with_label(label, plural)
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopologyKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopologyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ReportError::UnknownTopology(s.to_string()))
    }
}

/// Reasons an incoming report is rejected before it can reach merged state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("unknown topology {0:?}")]
    UnknownTopology(String),
    #[error("node with empty id in topology {topology}")]
    EmptyNodeId { topology: String },
    #[error("node keyed {key:?} in topology {topology} carries id {id:?}")]
    NodeIdMismatch {
        topology: String,
        key: String,
        id: String,
    },
    #[error("node {id:?} filed under {topology} claims topology {claimed:?}")]
    TopologyMismatch {
        id: String,
        topology: String,
        claimed: String,
    },
}

/// A snapshot of every topology one or more probes observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireReport", into = "WireReport")]
pub struct Report {
    topologies: BTreeMap<TopologyKind, Topology>,
    /// How long the observations stay representative.
    pub window: Duration,
    /// Probes whose observations this report contains.
    pub probes: IdList,
    /// Asks the aggregator to re-render right away.
    pub shortcut: bool,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            topologies: TopologyKind::ALL
                .into_iter()
                .map(|k| (k, k.empty_topology()))
                .collect(),
            window: Duration::ZERO,
            probes: IdList::new(),
            shortcut: false,
        }
    }
}

impl Report {
    pub fn new(probe_id: &str) -> Self {
        Self {
            probes: IdList::new().add(probe_id),
            ..Self::default()
        }
    }

    pub fn topology(&self, kind: TopologyKind) -> &Topology {
        &self.topologies[&kind]
    }

    /// Mutable slot access while a producer assembles its own report.
    pub fn topology_mut(&mut self, kind: TopologyKind) -> &mut Topology {
        self.topologies
            .entry(kind)
            .or_insert_with(|| kind.empty_topology())
    }

    pub fn topologies(&self) -> impl Iterator<Item = (TopologyKind, &Topology)> {
        self.topologies.iter().map(|(k, t)| (*k, t))
    }

    pub fn node_count(&self) -> usize {
        self.topologies.values().map(|t| t.nodes.len()).sum()
    }

    /// Finds a node by ID, trying the topology named by its tag first.
    pub fn node(&self, id: &str) -> Option<(TopologyKind, &Node)> {
        if let Some(kind) = TopologyKind::from_node_id(id) {
            if let Some(node) = self.topology(kind).nodes.get(id) {
                return Some((kind, node));
            }
        }
        self.topologies()
            .find_map(|(kind, t)| t.nodes.get(id).map(|n| (kind, n)))
    }

    pub fn merge(&self, other: &Report) -> Report {
        Report {
            topologies: TopologyKind::ALL
                .into_iter()
                .map(|k| (k, self.topology(k).merge(other.topology(k))))
                .collect(),
            window: self.window.max(other.window),
            probes: self.probes.merge(&other.probes),
            shortcut: self.shortcut || other.shortcut,
        }
    }

    /// Records `probe_id` as an origin of every top-level node, seen at `seen`.
    pub fn with_origin(&self, probe_id: &str, seen: OffsetDateTime) -> Report {
        let mut out = self.map_topologies(|_, t| Topology {
            nodes: t.nodes.map_nodes(|n| Some(n.clone().with_origin(probe_id, seen))),
            ..t.clone()
        });
        out.probes = out.probes.add(probe_id);
        out
    }

    /// Aging hook. Forgets the `stale` probes entirely, and drops a single
    /// origin from a node when `expired(origin, seen)` holds for the time that
    /// origin last reported it. Nodes left without any origin are dropped
    /// together with adjacency pointing at them; nodes that never carried
    /// origin data are kept.
    pub fn prune_origins(
        &self,
        stale: &BTreeSet<String>,
        expired: impl Fn(&str, OffsetDateTime) -> bool,
    ) -> Report {
        let mut removed: BTreeSet<String> = BTreeSet::new();
        let pruned = self.map_topologies(|_, t| {
            let nodes = t.nodes.map_nodes(|n| {
                if n.origins().is_none() {
                    return Some(n.clone());
                }
                let mut node = n.clone();
                node.sets = node.sets.retain_values(keys::ORIGINS, |origin| {
                    !stale.contains(origin)
                        && !n.origin_seen(origin).is_some_and(|seen| expired(origin, seen))
                });
                if node.origins().is_none() {
                    None
                } else {
                    Some(node)
                }
            });
            removed.extend(t.nodes.ids().filter(|id| !nodes.contains(id)).map(String::from));
            Topology { nodes, ..t.clone() }
        });

        let mut out = if removed.is_empty() {
            pruned
        } else {
            pruned.map_topologies(|_, t| Topology {
                nodes: t.nodes.map_nodes(|n| {
                    let mut node = n.clone();
                    node.adjacency = node.adjacency.retain(|id| !removed.contains(id));
                    Some(node)
                }),
                ..t.clone()
            })
        };
        out.probes = out.probes.retain(|p| !stale.contains(p));
        out
    }

    fn map_topologies(&self, mut f: impl FnMut(TopologyKind, &Topology) -> Topology) -> Report {
        Report {
            topologies: self.topologies.iter().map(|(k, t)| (*k, f(*k, t))).collect(),
            window: self.window,
            probes: self.probes.clone(),
            shortcut: self.shortcut,
        }
    }
}

/// Serialised form: topologies keyed by name so unknown names can be
/// rejected with a useful error.
#[derive(Serialize, Deserialize)]
struct WireReport {
    #[serde(default)]
    window: Duration,
    #[serde(default)]
    probes: IdList,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    shortcut: bool,
    #[serde(default)]
    topologies: BTreeMap<String, Topology>,
}

impl TryFrom<WireReport> for Report {
    type Error = ReportError;

    fn try_from(wire: WireReport) -> Result<Self, Self::Error> {
        let mut report = Report {
            window: wire.window,
            probes: wire.probes,
            shortcut: wire.shortcut,
            ..Report::default()
        };
        for (name, topology) in wire.topologies {
            let kind: TopologyKind = name.parse()?;
            validate_topology(kind, &topology)?;
            let merged = report.topology(kind).merge(&topology);
            report.topologies.insert(kind, merged);
        }
        Ok(report)
    }
}

impl From<Report> for WireReport {
    fn from(report: Report) -> Self {
        WireReport {
            window: report.window,
            probes: report.probes,
            shortcut: report.shortcut,
            topologies: report
                .topologies
                .into_iter()
                .map(|(k, t)| (k.as_str().to_string(), t))
                .collect(),
        }
    }
}

fn validate_topology(kind: TopologyKind, topology: &Topology) -> Result<(), ReportError> {
    for (key, node) in topology.nodes.entries() {
        if node.id.is_empty() {
            return Err(ReportError::EmptyNodeId {
                topology: kind.to_string(),
            });
        }
        if *key != node.id {
            return Err(ReportError::NodeIdMismatch {
                topology: kind.to_string(),
                key: key.clone(),
                id: node.id.clone(),
            });
        }
        if !node.topology.is_empty() && node.topology != kind.as_str() {
            return Err(ReportError::TopologyMismatch {
                id: node.id.clone(),
                topology: kind.to_string(),
                claimed: node.topology.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn t(secs: i64) -> OffsetDateTime {
        datetime!(2024-05-01 08:00:00 UTC) + time::Duration::seconds(secs)
    }

    fn pod(uid: &str, state: &str, at: i64) -> Node {
        Node::new(ids::make_pod_node_id(uid))
            .with_topology("pod")
            .with_latest(keys::STATE, t(at), state)
    }

    fn report_a() -> Report {
        let mut r = Report::new("probe-a");
        r.window = Duration::from_secs(15);
        r.topology_mut(TopologyKind::Pod).add_node(pod("p1", "Pending", 0));
        r.topology_mut(TopologyKind::Host)
            .add_node(Node::new(ids::make_host_node_id("n1")).with_topology("host"));
        r
    }

    fn report_b() -> Report {
        let mut r = Report::new("probe-b");
        r.window = Duration::from_secs(30);
        r.topology_mut(TopologyKind::Pod).add_node(pod("p1", "Running", 10));
        r.topology_mut(TopologyKind::Pod).add_node(pod("p2", "Running", 3));
        r
    }

    #[test]
    fn merge_is_order_independent_and_idempotent() {
        let a = report_a();
        let b = report_b();

        let ab = a.merge(&b);
        assert_eq!(ab, b.merge(&a));
        assert_eq!(ab.merge(&b), ab);
        assert_eq!(ab.merge(&a).merge(&b), ab);
        assert_eq!(a.merge(&a), a);

        assert_eq!(ab.window, Duration::from_secs(30));
        assert_eq!(ab.probes.len(), 2);
        assert_eq!(ab.node_count(), 3);
        let p1 = ab.topology(TopologyKind::Pod).nodes.get(&ids::make_pod_node_id("p1"));
        assert_eq!(p1.and_then(|n| n.lookup(keys::STATE)), Some("Running"));
    }

    #[test]
    fn merge_treats_missing_topologies_as_empty() {
        let merged = Report::default().merge(&report_a());
        assert_eq!(merged.node_count(), 2);
        assert_eq!(merged.topology(TopologyKind::CstorPool).nodes.len(), 0);
    }

    #[test]
    fn node_lookup_uses_id_tag() {
        let r = report_a();
        let (kind, node) = r.node(&ids::make_pod_node_id("p1")).expect("pod found");
        assert_eq!(kind, TopologyKind::Pod);
        assert_eq!(node.lookup(keys::STATE), Some("Pending"));
        assert!(r.node("nope").is_none());
    }

    #[test]
    fn serde_round_trip_keeps_report() {
        let r = report_a().merge(&report_b());
        let json = serde_json::to_string(&r).expect("serialize");
        let back: Report = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
    }

    #[test]
    fn unknown_topology_is_rejected() {
        let json = r#"{"topologies": {"spaceships": {"nodes": {}}}}"#;
        let err = serde_json::from_str::<Report>(json).unwrap_err();
        assert!(err.to_string().contains("unknown topology"));
    }

    #[test]
    fn mismatched_node_key_is_rejected() {
        let json = r#"{"topologies": {"pod": {"nodes": {"a;<pod>": {"id": "b;<pod>"}}}}}"#;
        let err = serde_json::from_str::<Report>(json).unwrap_err();
        assert!(err.to_string().contains("carries id"));

        let json = r#"{"topologies": {"pod": {"nodes": {"a;<pod>": {"id": "a;<pod>", "topology": "host"}}}}}"#;
        assert!(serde_json::from_str::<Report>(json).is_err());
    }

    #[test]
    fn origins_are_stamped_and_pruned() {
        let a = report_a().with_origin("probe-a", t(10));
        let b = report_b().with_origin("probe-b", t(10));
        let merged = a.merge(&b);

        let stale = BTreeSet::from(["probe-a".to_string()]);
        let pruned = merged.prune_origins(&stale, |_, _| false);

        let pods = &pruned.topology(TopologyKind::Pod).nodes;
        assert!(pods.contains(&ids::make_pod_node_id("p1")));
        assert!(pods.contains(&ids::make_pod_node_id("p2")));
        assert!(pruned.topology(TopologyKind::Host).nodes.is_empty());
        assert!(!pruned.probes.contains("probe-a"));
        assert_eq!(
            pods.get(&ids::make_pod_node_id("p1"))
                .and_then(|n| n.origins())
                .map(|o| o.len()),
            Some(1)
        );
    }

    #[test]
    fn expired_origins_are_dropped_per_node() {
        let mut earlier = Report::new("probe-a");
        earlier.topology_mut(TopologyKind::Pod).add_node(pod("p1", "Running", 0));
        earlier.topology_mut(TopologyKind::Pod).add_node(pod("p2", "Running", 0));
        let mut later = Report::new("probe-a");
        later.topology_mut(TopologyKind::Pod).add_node(pod("p2", "Running", 0));
        let shared = report_b().with_origin("probe-b", t(0));

        let merged = earlier
            .with_origin("probe-a", t(0))
            .merge(&later.with_origin("probe-a", t(20)))
            .merge(&shared);
        let p1 = merged
            .topology(TopologyKind::Pod)
            .nodes
            .get(&ids::make_pod_node_id("p1"))
            .expect("p1");
        assert_eq!(p1.origin_seen("probe-a"), Some(t(0)));

        let pruned = merged.prune_origins(&BTreeSet::new(), |origin, seen| {
            origin == "probe-a" && seen < t(20)
        });
        let pods = &pruned.topology(TopologyKind::Pod).nodes;
        let p1 = pods.get(&ids::make_pod_node_id("p1")).expect("still vouched for");
        assert_eq!(p1.origins().map(|o| o.len()), Some(1));
        assert!(pods.contains(&ids::make_pod_node_id("p2")));
        assert!(pruned.probes.contains("probe-a"));
    }

    #[test]
    fn pruning_drops_edges_to_removed_nodes() {
        let host = ids::make_host_node_id("n1");
        let mut a = Report::new("probe-a");
        a.topology_mut(TopologyKind::Host)
            .add_node(Node::new(host.clone()).with_topology("host"));
        let mut b = Report::new("probe-b");
        b.topology_mut(TopologyKind::Pod)
            .add_node(pod("p1", "Running", 0).with_adjacent(host.clone()));

        let merged = a
            .with_origin("probe-a", t(10))
            .merge(&b.with_origin("probe-b", t(10)));
        let pruned = merged.prune_origins(&BTreeSet::from(["probe-a".to_string()]), |_, _| false);

        let p1 = pruned
            .topology(TopologyKind::Pod)
            .nodes
            .get(&ids::make_pod_node_id("p1"))
            .expect("pod kept");
        assert!(!p1.adjacency.contains(&host));
    }
}
