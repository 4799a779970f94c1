//! Translation of inventory objects into report nodes.
//!
//! Every resource kind implements [`Producer`]; the report builder only ever
//! talks to that trait, so adding a kind means adding a variant to
//! [`Resource`] and its topology registration below.

mod cstor;
mod pod;
mod volume;
mod workload;

pub use cstor::{CStorPool, CStorVolume, CStorVolumeReplica};
pub use pod::Pod;
pub use volume::{PersistentVolume, PersistentVolumeClaim};
pub use workload::{Deployment, Host};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use topograph_core::{
    keys, Control, Controls, MetadataSource, MetadataTemplate, MetadataTemplates, Node, Report,
    TableTemplate, TableTemplates, TopologyKind, ADMIN_CONTROL, READ_ONLY_CONTROL,
};

pub const GET_LOGS: &str = "get_logs";
pub const DESCRIBE: &str = "describe";
pub const DELETE_POD: &str = "delete_pod";

/// Per-cycle inputs shared by every producer.
#[derive(Debug, Clone)]
pub struct ProduceContext {
    pub probe_id: String,
    pub now: OffsetDateTime,
}

pub trait Producer {
    fn topology(&self) -> TopologyKind;

    /// Stable ID derived from the resource's durable identifier.
    fn node_id(&self) -> String;

    fn node(&self, ctx: &ProduceContext) -> Node;
}

/// Object metadata common to every orchestrator resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub creation_timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Node carrying the name, namespace, UID, creation time and labels.
    pub fn meta_node(&self, id: String, kind: TopologyKind, ctx: &ProduceContext) -> Node {
        let mut latests = vec![
            (keys::NAME.to_string(), self.name.clone()),
            (keys::UID.to_string(), self.uid.clone()),
        ];
        if !self.namespace.is_empty() {
            latests.push((keys::NAMESPACE.to_string(), self.namespace.clone()));
        }
        if let Some(created) = self.creation_timestamp {
            if let Ok(text) = created.format(&time::format_description::well_known::Rfc3339) {
                latests.push((keys::CREATED.to_string(), text));
            }
        }
        latests.extend(
            self.labels
                .iter()
                .map(|(k, v)| (keys::label_key(k), v.clone())),
        );
        Node::new(id)
            .with_topology(kind.as_str())
            .with_latests(ctx.now, latests)
    }
}

/// The closed set of resource kinds a probe can report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Host(Host),
    Pod(Pod),
    Deployment(Deployment),
    PersistentVolume(PersistentVolume),
    PersistentVolumeClaim(PersistentVolumeClaim),
    CStorVolume(CStorVolume),
    CStorVolumeReplica(CStorVolumeReplica),
    CStorPool(CStorPool),
}

impl Resource {
    fn producer(&self) -> &dyn Producer {
        match self {
            Resource::Host(r) => r,
            Resource::Pod(r) => r,
            Resource::Deployment(r) => r,
            Resource::PersistentVolume(r) => r,
            Resource::PersistentVolumeClaim(r) => r,
            Resource::CStorVolume(r) => r,
            Resource::CStorVolumeReplica(r) => r,
            Resource::CStorPool(r) => r,
        }
    }

    pub fn as_pod(&self) -> Option<&Pod> {
        match self {
            Resource::Pod(pod) => Some(pod),
            _ => None,
        }
    }
}

impl Producer for Resource {
    fn topology(&self) -> TopologyKind {
        self.producer().topology()
    }

    fn node_id(&self) -> String {
        self.producer().node_id()
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        self.producer().node(ctx)
    }
}

fn control(id: &str, human: &str, icon: &str, category: &str, rank: i32) -> Control {
    Control {
        id: id.to_string(),
        human: human.to_string(),
        category: category.to_string(),
        icon: icon.to_string(),
        confirmation: None,
        rank,
    }
}

fn describe_control() -> Control {
    control(DESCRIBE, "Describe", "fa fa-file-text", READ_ONLY_CONTROL, 2)
}

fn common_templates() -> impl Iterator<Item = MetadataTemplate> {
    [
        MetadataTemplate::new(keys::NAMESPACE, "Namespace", 1),
        MetadataTemplate::new(keys::CREATED, "Created", 9).with_datatype("datetime"),
    ]
    .into_iter()
}

fn labels_table() -> TableTemplates {
    [TableTemplate {
        id: "labels".to_string(),
        label: "Labels".to_string(),
        prefix: keys::LABEL_PREFIX.to_string(),
    }]
    .into_iter()
    .collect()
}

/// Registers controls and display templates for every kind this probe
/// reports.
pub fn register_topologies(report: &mut Report) {
    let describe: Controls = [describe_control()].into_iter().collect();

    let mut pod_controls = describe.copy();
    pod_controls.add_controls([
        control(GET_LOGS, "Get logs", "fa fa-desktop", READ_ONLY_CONTROL, 0),
        Control {
            confirmation: Some("Delete this pod?".to_string()),
            ..control(DELETE_POD, "Delete", "fa fa-trash-o", ADMIN_CONTROL, 1)
        },
    ]);
    let pod_templates: MetadataTemplates = common_templates()
        .chain([
            MetadataTemplate::new(keys::STATE, "State", 2),
            MetadataTemplate::new(keys::IP, "IP", 3).with_datatype("ip"),
            MetadataTemplate::new(keys::RESTART_COUNT, "Restart #", 4).with_datatype("number"),
            MetadataTemplate::new(keys::HOST_NODE_NAME, "Node", 5),
            MetadataTemplate::new(keys::VOLUME_CLAIM, "Volume claims", 6),
            MetadataTemplate::new("container", "Containers", 7)
                .from_source(MetadataSource::Counters),
        ])
        .collect();
    let pods = report
        .topology(TopologyKind::Pod)
        .clone()
        .with_controls(&pod_controls)
        .with_metadata_templates(&pod_templates)
        .with_table_templates(&labels_table());
    *report.topology_mut(TopologyKind::Pod) = pods;

    let templates_for = |extra: Vec<MetadataTemplate>| -> MetadataTemplates {
        common_templates().chain(extra).collect()
    };
    let registrations = [
        (
            TopologyKind::Host,
            vec![
                MetadataTemplate::new(workload::OS, "OS", 2),
                MetadataTemplate::new(workload::KERNEL_VERSION, "Kernel", 3),
            ],
        ),
        (
            TopologyKind::Deployment,
            vec![
                MetadataTemplate::new(workload::DESIRED_REPLICAS, "Desired replicas", 2)
                    .with_datatype("number"),
                MetadataTemplate::new(workload::AVAILABLE_REPLICAS, "Available replicas", 3)
                    .with_datatype("number"),
                MetadataTemplate::new("pod", "Pods", 4).from_source(MetadataSource::Counters),
            ],
        ),
        (
            TopologyKind::PersistentVolume,
            vec![
                MetadataTemplate::new(keys::STATE, "Status", 2),
                MetadataTemplate::new(keys::CAPACITY, "Capacity", 3),
                MetadataTemplate::new(keys::STORAGE_CLASS_NAME, "Storage class", 4),
                MetadataTemplate::new(keys::VOLUME_CLAIM, "Claim", 5),
            ],
        ),
        (
            TopologyKind::PersistentVolumeClaim,
            vec![
                MetadataTemplate::new(keys::STATE, "Status", 2),
                MetadataTemplate::new(keys::VOLUME_NAME, "Volume", 3),
                MetadataTemplate::new(keys::STORAGE_CLASS_NAME, "Storage class", 4),
            ],
        ),
        (
            TopologyKind::CstorVolume,
            vec![
                MetadataTemplate::new(keys::NODE_TYPE, "Type", 2),
                MetadataTemplate::new(keys::STATE, "Status", 3),
                MetadataTemplate::new(keys::CAPACITY, "Capacity", 4),
                MetadataTemplate::new("cstor_volume_replica", "Replicas", 5)
                    .from_source(MetadataSource::Counters),
            ],
        ),
        (
            TopologyKind::CstorVolumeReplica,
            vec![
                MetadataTemplate::new(keys::NODE_TYPE, "Type", 2),
                MetadataTemplate::new(keys::CSTOR_VOLUME_NAME, "Volume", 3),
                MetadataTemplate::new(keys::CSTOR_POOL_UID, "Pool", 4),
            ],
        ),
        (
            TopologyKind::CstorPool,
            vec![MetadataTemplate::new(keys::NODE_TYPE, "Type", 2)],
        ),
    ];

    for (kind, extra) in registrations {
        let controls = if kind == TopologyKind::Host {
            Controls::new()
        } else {
            describe.copy()
        };
        let topology = report
            .topology(kind)
            .clone()
            .with_controls(&controls)
            .with_metadata_templates(&templates_for(extra))
            .with_table_templates(&labels_table());
        *report.topology_mut(kind) = topology;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn ctx() -> ProduceContext {
        ProduceContext {
            probe_id: "probe-1".to_string(),
            now: datetime!(2024-06-01 10:00:00 UTC),
        }
    }

    #[test]
    fn meta_node_carries_labels_and_created() {
        let meta = ObjectMeta {
            name: "web".to_string(),
            namespace: "default".to_string(),
            uid: "u-1".to_string(),
            creation_timestamp: Some(datetime!(2024-05-30 09:00:00 UTC)),
            labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
            annotations: BTreeMap::new(),
        };
        let node = meta.meta_node("x".to_string(), TopologyKind::Deployment, &ctx());

        assert_eq!(node.topology, "deployment");
        assert_eq!(node.lookup(keys::NAME), Some("web"));
        assert_eq!(node.lookup(keys::NAMESPACE), Some("default"));
        assert_eq!(node.lookup("label_app"), Some("web"));
        assert_eq!(node.lookup(keys::CREATED), Some("2024-05-30T09:00:00Z"));
    }

    #[test]
    fn resources_decode_by_kind_tag() {
        let json = r#"[
            {"kind": "CStorPool", "metadata": {"name": "pool-a", "uid": "p-1"}},
            {"kind": "Host", "hostname": "node-1"}
        ]"#;
        let resources: Vec<Resource> = serde_json::from_str(json).expect("decode");
        assert_eq!(resources[0].topology(), TopologyKind::CstorPool);
        assert_eq!(resources[1].node_id(), topograph_core::ids::make_host_node_id("node-1"));
    }

    #[test]
    fn registration_marks_delete_as_admin() {
        let mut report = Report::new("probe-1");
        register_topologies(&mut report);

        let pods = report.topology(TopologyKind::Pod);
        let delete = pods.controls.get(DELETE_POD).expect("delete registered");
        assert!(delete.is_admin());
        assert!(delete.confirmation.is_some());
        assert!(pods.controls.get(GET_LOGS).is_some());
        assert!(report
            .topology(TopologyKind::CstorVolume)
            .controls
            .get(DESCRIBE)
            .is_some());
        assert!(report.topology(TopologyKind::Host).controls.is_empty());
    }
}
