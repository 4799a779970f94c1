use serde::{Deserialize, Serialize};
use topograph_core::{ids, keys, Node, TopologyKind};

use super::{ObjectMeta, ProduceContext, Producer, DELETE_POD, DESCRIBE, GET_LOGS};

const CONFIG_HASH_ANNOTATION: &str = "kubernetes.io/config.hash";

// labels naming the persistent volume of a controller/target or replica pod
const VSM_LABEL: &str = "vsm";
const PERSISTENT_VOLUME_LABEL: &str = "openebs.io/persistent-volume";
const PV_LABEL: &str = "openebs.io/pv";

const APP_LABEL: &str = "app";
const CSTOR_POOL_APP: &str = "cstor-pool";
const REPLICA_LABEL: &str = "openebs.io/replica";
const JIVA_REPLICA: &str = "jiva-replica";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSource {
    pub claim_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodVolume {
    pub name: String,
    #[serde(default)]
    pub persistent_volume_claim: Option<ClaimSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub host_network: bool,
    #[serde(default)]
    pub volumes: Vec<PodVolume>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub restart_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default, rename = "podIP")]
    pub pod_ip: String,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
    /// Recorded log lines served by the get-logs control.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl Pod {
    /// Static pods report a mirror UID; the config hash is the stable one.
    pub fn uid(&self) -> &str {
        self.metadata
            .annotations
            .get(CONFIG_HASH_ANNOTATION)
            .map(String::as_str)
            .unwrap_or(self.metadata.uid.as_str())
    }

    pub fn restart_count(&self) -> u64 {
        self.status
            .container_statuses
            .iter()
            .map(|cs| u64::from(cs.restart_count))
            .sum()
    }

    pub fn volume_claim_names(&self) -> Vec<&str> {
        self.spec
            .volumes
            .iter()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.as_str())
            .collect()
    }

    pub fn is_replica_or_pool_pod(&self) -> bool {
        self.metadata.label(REPLICA_LABEL) == Some(JIVA_REPLICA)
            || self.metadata.label(APP_LABEL) == Some(CSTOR_POOL_APP)
    }

    /// Volume served by this pod; replica pods (`-rep-` in the name) have none.
    pub fn volume_name(&self) -> Option<&str> {
        if self.metadata.name.contains("-rep-") {
            return None;
        }
        [VSM_LABEL, PERSISTENT_VOLUME_LABEL, PV_LABEL]
            .into_iter()
            .find_map(|label| self.metadata.label(label))
    }
}

impl Producer for Pod {
    fn topology(&self) -> TopologyKind {
        TopologyKind::Pod
    }

    fn node_id(&self) -> String {
        ids::make_pod_node_id(self.uid())
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let mut latests = vec![
            (keys::STATE, self.status.phase.clone()),
            (keys::IP, self.status.pod_ip.clone()),
            (keys::CONTROL_PROBE_ID, ctx.probe_id.clone()),
            (keys::RESTART_COUNT, self.restart_count().to_string()),
        ];

        let claims = self.volume_claim_names();
        let mut volume_pod = !claims.is_empty() || self.is_replica_or_pool_pod();
        if !claims.is_empty() {
            latests.push((keys::VOLUME_CLAIM, claims.join(keys::SCOPE_DELIM)));
        }
        if self.spec.host_network {
            latests.push((keys::IS_IN_HOST_NETWORK, "true".to_string()));
        }
        if let Some(volume) = self.volume_name() {
            latests.push((keys::VOLUME_NAME, volume.to_string()));
            volume_pod = true;
        }
        if volume_pod {
            latests.push((keys::VOLUME_POD, "true".to_string()));
        }
        if !self.spec.node_name.is_empty() {
            latests.push((keys::HOST_NODE_NAME, self.spec.node_name.clone()));
        }

        let mut node = self
            .metadata
            .meta_node(self.node_id(), TopologyKind::Pod, ctx)
            .with_latests(ctx.now, latests)
            .with_latest_active_controls(ctx.now, [GET_LOGS, DELETE_POD, DESCRIBE])
            .with_counter(TopologyKind::Container.as_str(), self.spec.containers.len() as u64);

        for owner in self.owner_references.iter().filter(|o| o.kind == "Deployment") {
            node = node.with_parent(
                TopologyKind::Deployment.as_str(),
                ids::make_deployment_node_id(&owner.uid),
            );
        }
        if !self.spec.node_name.is_empty() {
            node = node
                .with_parent(
                    TopologyKind::Host.as_str(),
                    ids::make_host_node_id(&self.spec.node_name),
                )
                .with_adjacent(ids::make_host_node_id(&self.spec.node_name));
        }
        node
    }
}
