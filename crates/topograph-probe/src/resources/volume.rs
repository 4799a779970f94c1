use serde::{Deserialize, Serialize};
use topograph_core::{ids, keys, Node, TopologyKind};

use super::{ObjectMeta, ProduceContext, Producer, DESCRIBE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub storage_class_name: String,
    #[serde(default)]
    pub claim_ref: Option<ClaimRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    #[serde(default)]
    pub phase: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentVolume {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PersistentVolumeSpec,
    #[serde(default)]
    pub status: VolumeStatus,
}

impl Producer for PersistentVolume {
    fn topology(&self) -> TopologyKind {
        TopologyKind::PersistentVolume
    }

    fn node_id(&self) -> String {
        ids::make_persistent_volume_node_id(&self.metadata.name)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let mut latests = vec![(keys::STATE, self.status.phase.clone())];
        if !self.spec.capacity.is_empty() {
            latests.push((keys::CAPACITY, self.spec.capacity.clone()));
        }
        if !self.spec.storage_class_name.is_empty() {
            latests.push((keys::STORAGE_CLASS_NAME, self.spec.storage_class_name.clone()));
        }
        if let Some(claim) = &self.spec.claim_ref {
            latests.push((keys::VOLUME_CLAIM, claim.name.clone()));
        }
        self.metadata
            .meta_node(self.node_id(), self.topology(), ctx)
            .with_latests(ctx.now, latests)
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    #[serde(default)]
    pub volume_name: String,
    #[serde(default)]
    pub storage_class_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PersistentVolumeClaimSpec,
    #[serde(default)]
    pub status: VolumeStatus,
}

impl Producer for PersistentVolumeClaim {
    fn topology(&self) -> TopologyKind {
        TopologyKind::PersistentVolumeClaim
    }

    fn node_id(&self) -> String {
        ids::make_persistent_volume_claim_node_id(&self.metadata.uid)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let mut latests = vec![(keys::STATE, self.status.phase.clone())];
        if !self.spec.storage_class_name.is_empty() {
            latests.push((keys::STORAGE_CLASS_NAME, self.spec.storage_class_name.clone()));
        }
        let mut node = self.metadata.meta_node(self.node_id(), self.topology(), ctx);
        if !self.spec.volume_name.is_empty() {
            latests.push((keys::VOLUME_NAME, self.spec.volume_name.clone()));
            node = node.with_adjacent(ids::make_persistent_volume_node_id(&self.spec.volume_name));
        }
        node.with_latests(ctx.now, latests)
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn bound_claim_points_at_its_volume() {
        let ctx = ProduceContext {
            probe_id: "p".to_string(),
            now: datetime!(2024-06-01 10:00:00 UTC),
        };
        let claim = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: "data-web-0".to_string(),
                namespace: "default".to_string(),
                uid: "c-1".to_string(),
                ..ObjectMeta::default()
            },
            spec: PersistentVolumeClaimSpec {
                volume_name: "pvc-c-1".to_string(),
                storage_class_name: "openebs-cstor".to_string(),
            },
            status: VolumeStatus {
                phase: "Bound".to_string(),
            },
        };

        let node = claim.node(&ctx);
        assert_eq!(node.id, ids::make_persistent_volume_claim_node_id("c-1"));
        assert_eq!(node.lookup(keys::VOLUME_NAME), Some("pvc-c-1"));
        assert!(node
            .adjacency
            .contains(&ids::make_persistent_volume_node_id("pvc-c-1")));

        let unbound = PersistentVolumeClaim {
            spec: PersistentVolumeClaimSpec::default(),
            ..claim
        };
        assert!(unbound.node(&ctx).adjacency.is_empty());
    }
}
