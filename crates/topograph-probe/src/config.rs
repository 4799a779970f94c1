use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_INTERVAL_MS: u64 = 15_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub inventory: PathBuf,
    pub socket: PathBuf,
    pub probe_id: String,
    pub interval: Duration,
}

pub fn parse_args() -> Result<ProbeConfig> {
    parse_args_from(std::env::args_os().skip(1), default_probe_id())
}

fn parse_args_from<I>(args: I, default_id: String) -> Result<ProbeConfig>
where
    I: IntoIterator<Item = OsString>,
{
    let mut inventory = None;
    let mut socket = None;
    let mut probe_id = None;
    let mut interval = Duration::from_millis(DEFAULT_INTERVAL_MS);
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--inventory" {
            let Some(path) = args.next() else {
                anyhow::bail!("--inventory expects a path");
            };
            inventory = Some(PathBuf::from(path));
        } else if arg == "--socket" {
            let Some(path) = args.next() else {
                anyhow::bail!("--socket expects a path");
            };
            socket = Some(PathBuf::from(path));
        } else if arg == "--probe-id" {
            let Some(id) = args.next() else {
                anyhow::bail!("--probe-id expects a value");
            };
            let id = id.to_string_lossy().trim().to_string();
            if id.is_empty() {
                anyhow::bail!("--probe-id must not be empty");
            }
            probe_id = Some(id);
        } else if arg == "--interval-ms" {
            let Some(value) = args.next() else {
                anyhow::bail!("--interval-ms expects a number");
            };
            let ms: u64 = value
                .to_string_lossy()
                .parse()
                .with_context(|| format!("invalid --interval-ms {value:?}"))?;
            if ms == 0 {
                anyhow::bail!("--interval-ms must be positive");
            }
            interval = Duration::from_millis(ms);
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    let Some(inventory) = inventory else {
        anyhow::bail!("--inventory is required");
    };

    Ok(ProbeConfig {
        inventory,
        socket: socket.unwrap_or_else(default_socket_path),
        probe_id: probe_id.unwrap_or(default_id),
        interval,
    })
}

pub fn default_socket_path() -> PathBuf {
    // prefer XDG_RUNTIME_DIR
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) => PathBuf::from(dir).join("topograph-probe.sock"),
        None => PathBuf::from("/tmp/topograph-probe.sock"),
    }
}

fn default_probe_id() -> String {
    std::env::var("TOPOGRAPH_PROBE_ID")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "probe".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_all_flags() {
        let config = parse_args_from(
            args(&[
                "--inventory",
                "/srv/inventory.json",
                "--socket",
                "/run/p.sock",
                "--probe-id",
                "probe-7",
                "--interval-ms",
                "500",
            ]),
            "host".to_string(),
        )
        .expect("config parsed");

        assert_eq!(config.inventory, PathBuf::from("/srv/inventory.json"));
        assert_eq!(config.socket, PathBuf::from("/run/p.sock"));
        assert_eq!(config.probe_id, "probe-7");
        assert_eq!(config.interval, Duration::from_millis(500));
    }

    #[test]
    fn probe_id_falls_back_to_default() {
        let config = parse_args_from(args(&["--inventory", "inv.json"]), "node-3".to_string())
            .expect("config parsed");
        assert_eq!(config.probe_id, "node-3");
        assert_eq!(config.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
    }

    #[test]
    fn rejects_missing_inventory_and_bad_values() {
        assert!(parse_args_from(args(&[]), "h".into()).is_err());
        assert!(parse_args_from(args(&["--inventory"]), "h".into()).is_err());
        assert!(
            parse_args_from(args(&["--inventory", "i", "--interval-ms", "soon"]), "h".into())
                .is_err()
        );
        assert!(parse_args_from(args(&["--inventory", "i", "--verbose"]), "h".into()).is_err());
    }
}
