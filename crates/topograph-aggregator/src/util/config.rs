use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProbeEndpointKind {
    UdsPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeEndpoint {
    pub name: String,
    pub kind: ProbeEndpointKind,
    pub auto_connect: bool,
}

impl Default for ProbeEndpoint {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            kind: ProbeEndpointKind::UdsPath(runtime_socket("topograph-probe.sock")),
            auto_connect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub query_socket: String,
    /// A probe silent for longer than this loses the nodes only it reported.
    pub probe_expiry_secs: u64,
    pub prune_interval_secs: u64,
    pub control_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Offer admin-category controls to query clients.
    pub admin_controls: bool,
    /// Re-render period for subscribed clients when no shortcut arrives.
    pub subscribe_interval_ms: u64,
    #[serde(default = "default_probes")]
    pub probes: Vec<ProbeEndpoint>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            query_socket: runtime_socket("topograph.sock"),
            probe_expiry_secs: 45,
            prune_interval_secs: 5,
            control_timeout_ms: 10_000,
            reconnect_initial_ms: 250,
            reconnect_max_ms: 10_000,
            admin_controls: true,
            subscribe_interval_ms: 1_000,
            probes: default_probes(),
        }
    }
}

impl AggregatorConfig {
    pub fn probe_expiry(&self) -> Duration {
        Duration::from_secs(self.probe_expiry_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn subscribe_interval(&self) -> Duration {
        Duration::from_millis(self.subscribe_interval_ms.max(50))
    }
}

fn runtime_dir() -> &'static str {
    static CACHED: OnceLock<String> = OnceLock::new();
    CACHED.get_or_init(|| std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string()))
}

fn runtime_socket(name: &str) -> String {
    format!("{}/{name}", runtime_dir())
}

fn default_probes() -> Vec<ProbeEndpoint> {
    vec![ProbeEndpoint::default()]
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "topograph")?;
    Some(proj.config_dir().join("aggregator.toml"))
}

pub fn load_or_default() -> AggregatorConfig {
    let Some(path) = config_file_path() else {
        return AggregatorConfig::default();
    };
    load_or_default_from_path(&path)
}

pub fn load_or_default_from_path(path: &Path) -> AggregatorConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return AggregatorConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "invalid config; using defaults");
        AggregatorConfig::default()
    })
}

pub fn save(cfg: &AggregatorConfig) -> anyhow::Result<()> {
    let Some(path) = config_file_path() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(cfg, &path)
}

pub fn save_to_path(cfg: &AggregatorConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize aggregator config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write aggregator config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn aggregator_config_roundtrip_save_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("aggregator.toml");
        let cfg = AggregatorConfig {
            admin_controls: false,
            control_timeout_ms: 250,
            ..AggregatorConfig::default()
        };

        save_to_path(&cfg, &path).expect("save config");
        let loaded = load_or_default_from_path(&path);

        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_or_broken_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("aggregator.toml");
        assert_eq!(load_or_default_from_path(&path), AggregatorConfig::default());

        fs::write(&path, "probe_expiry_secs = \"soon\"").expect("write");
        assert_eq!(load_or_default_from_path(&path), AggregatorConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("aggregator.toml");
        fs::write(&path, "probe_expiry_secs = 90\n").expect("write");

        let loaded = load_or_default_from_path(&path);
        assert_eq!(loaded.probe_expiry(), Duration::from_secs(90));
        assert_eq!(loaded.probes, default_probes());
    }

    #[test]
    fn probe_endpoint_roundtrip() {
        let endpoint = ProbeEndpoint {
            name: "edge".to_string(),
            kind: ProbeEndpointKind::UdsPath("/tmp/edge.sock".to_string()),
            auto_connect: false,
        };

        let encoded = toml::to_string(&endpoint).expect("serialize endpoint");
        let decoded: ProbeEndpoint = toml::from_str(&encoded).expect("deserialize endpoint");

        assert_eq!(endpoint, decoded);
    }

    #[test]
    fn probe_endpoint_rejects_unknown_kind() {
        let bad = r#"
name = "bad"
kind = "tcp"
value = "127.0.0.1:1234"
auto_connect = true
"#;

        let decoded: Result<ProbeEndpoint, _> = toml::from_str(bad);
        assert!(decoded.is_err());
    }
}
