use serde::{Deserialize, Serialize};
use topograph_core::{ids, keys, Node, TopologyKind};

use super::{ObjectMeta, ProduceContext, Producer, DESCRIBE};

pub(crate) const OS: &str = "os";
pub(crate) const KERNEL_VERSION: &str = "kernel_version";
pub(crate) const DESIRED_REPLICAS: &str = "desired_replicas";
pub(crate) const AVAILABLE_REPLICAS: &str = "available_replicas";

/// A cluster node running the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub hostname: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub kernel_version: String,
}

impl Producer for Host {
    fn topology(&self) -> TopologyKind {
        TopologyKind::Host
    }

    fn node_id(&self) -> String {
        ids::make_host_node_id(&self.hostname)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        let latests = [
            (keys::HOST_NAME, self.hostname.as_str()),
            (OS, self.os.as_str()),
            (KERNEL_VERSION, self.kernel_version.as_str()),
        ];
        Node::new(self.node_id())
            .with_topology(self.topology().as_str())
            .with_latests(ctx.now, latests.into_iter().filter(|(_, v)| !v.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    #[serde(default)]
    pub replicas: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub available_replicas: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
    #[serde(default)]
    pub status: DeploymentStatus,
}

impl Producer for Deployment {
    fn topology(&self) -> TopologyKind {
        TopologyKind::Deployment
    }

    fn node_id(&self) -> String {
        ids::make_deployment_node_id(&self.metadata.uid)
    }

    fn node(&self, ctx: &ProduceContext) -> Node {
        self.metadata
            .meta_node(self.node_id(), self.topology(), ctx)
            .with_latests(
                ctx.now,
                [
                    (DESIRED_REPLICAS, self.spec.replicas.to_string()),
                    (AVAILABLE_REPLICAS, self.status.available_replicas.to_string()),
                ],
            )
            .with_latest_active_controls(ctx.now, [DESCRIBE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn host_skips_unknown_fields() {
        let ctx = ProduceContext {
            probe_id: "p".to_string(),
            now: datetime!(2024-06-01 10:00:00 UTC),
        };
        let host = Host {
            hostname: "node-1".to_string(),
            os: "linux".to_string(),
            kernel_version: String::new(),
        };
        let node = host.node(&ctx);
        assert_eq!(node.lookup(keys::HOST_NAME), Some("node-1"));
        assert_eq!(node.lookup(OS), Some("linux"));
        assert!(node.lookup(KERNEL_VERSION).is_none());
    }
}
