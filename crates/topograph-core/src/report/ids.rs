//! Node ID scheme.
//!
//! IDs are derived from a durable resource key plus a topology tag, e.g.
//! `3f2c...;<pod>`, so re-observing a resource always yields the same ID.

use super::TopologyKind;

const DELIM: char = ';';

pub fn make_node_id(tag: &str, key: &str) -> String {
    format!("{key}{DELIM}<{tag}>")
}

/// Splits an ID into its resource key and topology tag.
pub fn parse_node_id(id: &str) -> Option<(&str, &str)> {
    let (key, rest) = id.rsplit_once(DELIM)?;
    let tag = rest.strip_prefix('<')?.strip_suffix('>')?;
    if tag.is_empty() {
        return None;
    }
    Some((key, tag))
}

pub fn make_id_for(kind: TopologyKind, key: &str) -> String {
    make_node_id(kind.as_str(), key)
}

pub fn make_process_node_id(host: &str, pid: &str) -> String {
    make_id_for(TopologyKind::Process, &format!("{host}{DELIM}{pid}"))
}

pub fn make_container_node_id(container_id: &str) -> String {
    make_id_for(TopologyKind::Container, container_id)
}

pub fn make_host_node_id(hostname: &str) -> String {
    make_id_for(TopologyKind::Host, hostname)
}

pub fn make_pod_node_id(uid: &str) -> String {
    make_id_for(TopologyKind::Pod, uid)
}

pub fn make_deployment_node_id(uid: &str) -> String {
    make_id_for(TopologyKind::Deployment, uid)
}

pub fn make_persistent_volume_node_id(name: &str) -> String {
    make_id_for(TopologyKind::PersistentVolume, name)
}

pub fn make_persistent_volume_claim_node_id(uid: &str) -> String {
    make_id_for(TopologyKind::PersistentVolumeClaim, uid)
}

/// cStor volumes are keyed by name: replicas only know their volume's name.
pub fn make_cstor_volume_node_id(name: &str) -> String {
    make_id_for(TopologyKind::CstorVolume, name)
}

pub fn make_cstor_volume_replica_node_id(uid: &str) -> String {
    make_id_for(TopologyKind::CstorVolumeReplica, uid)
}

pub fn make_cstor_pool_node_id(uid: &str) -> String {
    make_id_for(TopologyKind::CstorPool, uid)
}
