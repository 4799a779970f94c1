use serde::{Deserialize, Serialize};
use topograph_core::{ids, keys, Node, TopologyKind};

use super::{ObjectMeta, ProduceContext, Producer, DESCRIBE};

const VOLUME_NAME_LABEL: &str = "cstorvolume.openebs.io/name";
const POOL_UID_LABEL: &str = "cstorpool.openebs.io/uid";
const PERSISTENT_VOLUME_LABEL: &str = "openebs.io/persistent-volume";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CStorStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub capacity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CStorVolume {
    #[serde(default)]
    pub api_version: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: CStorStatus,
}

impl Producer for CStorVolume {
    fn topology(&self) -> TopologyKind {
        TopologyKind::CstorVolume
    }

    /// Keyed by name, the only handle replicas carry.
    fn node_id(&self) -> String {
        ids::make_cstor_volume_node_id(&self.metadata.name)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let mut latests = vec![
            (keys::NODE_TYPE, "CStor Volume".to_string()),
            (keys::API_VERSION, self.api_version.clone()),
        ];
        if !self.status.phase.is_empty() {
            latests.push((keys::STATE, self.status.phase.clone()));
        }
        if !self.status.capacity.is_empty() {
            latests.push((keys::CAPACITY, self.status.capacity.clone()));
        }
        if let Some(pv) = self.metadata.label(PERSISTENT_VOLUME_LABEL) {
            latests.push((keys::VOLUME_NAME, pv.to_string()));
        }
        self.metadata
            .meta_node(self.node_id(), self.topology(), ctx)
            .with_latests(ctx.now, latests)
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CStorVolumeReplica {
    #[serde(default)]
    pub api_version: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: CStorStatus,
}

impl CStorVolumeReplica {
    pub fn cstor_volume(&self) -> Option<&str> {
        self.metadata.label(VOLUME_NAME_LABEL).filter(|v| !v.is_empty())
    }

    pub fn cstor_pool(&self) -> Option<&str> {
        self.metadata.label(POOL_UID_LABEL).filter(|v| !v.is_empty())
    }
}

impl Producer for CStorVolumeReplica {
    fn topology(&self) -> TopologyKind {
        TopologyKind::CstorVolumeReplica
    }

    fn node_id(&self) -> String {
        ids::make_cstor_volume_replica_node_id(&self.metadata.uid)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let mut latests = vec![
            (keys::NODE_TYPE, "CStor Volume Replica".to_string()),
            (keys::API_VERSION, self.api_version.clone()),
        ];
        if !self.status.phase.is_empty() {
            latests.push((keys::STATE, self.status.phase.clone()));
        }
        if let Some(volume) = self.cstor_volume() {
            latests.push((keys::CSTOR_VOLUME_NAME, volume.to_string()));
        }
        let mut node = self.metadata.meta_node(self.node_id(), self.topology(), ctx);
        if let Some(pool) = self.cstor_pool() {
            latests.push((keys::CSTOR_POOL_UID, pool.to_string()));
            node = node.with_adjacent(ids::make_cstor_pool_node_id(pool));
        }
        node.with_latests(ctx.now, latests)
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CStorPool {
    #[serde(default)]
    pub api_version: String,
    pub metadata: ObjectMeta,
}

impl Producer for CStorPool {
    fn topology(&self) -> TopologyKind {
        TopologyKind::CstorPool
    }

    fn node_id(&self) -> String {
        ids::make_cstor_pool_node_id(&self.metadata.uid)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        self.metadata
            .meta_node(self.node_id(), self.topology(), ctx)
            .with_latests(
                ctx.now,
                [
                    (keys::NODE_TYPE, "CStor Pool".to_string()),
                    (keys::API_VERSION, self.api_version.clone()),
                ],
            )
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}
