//! Well-known metadata keys shared by producers and renderers.
//!
//! Producers must use these keys so generic renderers can find values without
//! knowing which resource kind emitted a node.

// Object metadata.
pub const NAME: &str = "name";
pub const NAMESPACE: &str = "namespace";
pub const UID: &str = "uid";
pub const CREATED: &str = "created";
pub const NODE_TYPE: &str = "node_type";
pub const API_VERSION: &str = "api_version";
pub const LABEL_PREFIX: &str = "label_";

// Workload state.
pub const STATE: &str = "state";
pub const IP: &str = "ip";
pub const RESTART_COUNT: &str = "restart_count";
pub const IS_IN_HOST_NETWORK: &str = "is_in_host_network";
pub const HOST_NAME: &str = "host_name";
pub const HOST_NODE_NAME: &str = "host_node_name";

// Storage.
pub const VOLUME_CLAIM: &str = "volume_claim";
pub const VOLUME_NAME: &str = "volume_name";
pub const VOLUME_POD: &str = "volume_pod";
pub const STORAGE_CLASS_NAME: &str = "storage_class_name";
pub const CAPACITY: &str = "capacity";
pub const CSTOR_VOLUME_NAME: &str = "cstor_volume_name";
pub const CSTOR_POOL_UID: &str = "cstor_pool_uid";

/// Probe that should execute controls for a node.
pub const CONTROL_PROBE_ID: &str = "control_probe_id";

/// Set key recording which probes reported a node.
pub const ORIGINS: &str = "origins";

/// Latest key prefix, followed by a probe ID, timestamped with when that
/// probe last reported the node.
pub const ORIGIN_SEEN_PREFIX: &str = "origin/";

/// Set key prefix for parent IDs, followed by the parent topology name.
pub const PARENTS_PREFIX: &str = "parents/";

/// Separator for multi-valued scalar metadata (e.g. several claim names).
pub const SCOPE_DELIM: &str = "\u{1f}";

pub fn parents_key(topology: &str) -> String {
    format!("{PARENTS_PREFIX}{topology}")
}

pub fn origin_seen_key(probe_id: &str) -> String {
    format!("{ORIGIN_SEEN_PREFIX}{probe_id}")
}

pub fn label_key(label: &str) -> String {
    format!("{LABEL_PREFIX}{label}")
}

/// Splits a multi-valued scalar, skipping empty parts.
pub fn split_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(SCOPE_DELIM).filter(|v| !v.is_empty())
}
