mod collector;
mod control;
mod ingest;
mod net;
mod render;
mod server;
mod util;

use anyhow::{Context, Result};
use collector::Collector;
use control::ControlRouter;
use net::{Backoff, LinkConfig, ProbeLinks};
use render::Views;
use server::QueryServer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use util::config::{self, AggregatorConfig, ProbeEndpointKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// `--config <path>` overrides the per-user config file; `--write-config`
/// saves the effective config there and exits.
fn load_config() -> Result<Option<AggregatorConfig>> {
    let mut args = std::env::args().skip(1);
    let mut path: Option<PathBuf> = None;
    let mut write = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().context("--config needs a path")?;
                path = Some(PathBuf::from(value));
            }
            "--write-config" => write = true,
            other => anyhow::bail!("unknown argument {other}"),
        }
    }
    let cfg = match &path {
        Some(path) => config::load_or_default_from_path(path),
        None => config::load_or_default(),
    };
    if !write {
        return Ok(Some(cfg));
    }
    match &path {
        Some(path) => config::save_to_path(&cfg, path)?,
        None => config::save(&cfg)?,
    }
    tracing::info!("config written");
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let Some(cfg) = load_config()? else {
        return Ok(());
    };
    tracing::info!(
        probes = cfg.probes.len(),
        query_socket = %cfg.query_socket,
        probe_expiry_secs = cfg.probe_expiry_secs,
        admin_controls = cfg.admin_controls,
        "aggregator starting"
    );

    let collector = Arc::new(Collector::new(cfg.probe_expiry()));
    let links = ProbeLinks::new();
    let router = Arc::new(ControlRouter::new(
        Arc::clone(&collector),
        links.clone(),
        cfg.control_timeout(),
        cfg.admin_controls,
    ));

    let (events_tx, events_rx) = mpsc::channel(256);
    for endpoint in cfg.probes.iter().filter(|p| p.auto_connect) {
        let ProbeEndpointKind::UdsPath(path) = &endpoint.kind;
        net::spawn_link(
            LinkConfig {
                endpoint: endpoint.name.clone(),
                sock_path: path.clone(),
                backoff: Backoff::new(
                    Duration::from_millis(cfg.reconnect_initial_ms),
                    Duration::from_millis(cfg.reconnect_max_ms),
                ),
            },
            links.clone(),
            events_tx.clone(),
        );
    }
    drop(events_tx);
    tokio::spawn(ingest::pump(
        events_rx,
        Arc::clone(&collector),
        Arc::clone(&router),
    ));

    let pruner = Arc::clone(&collector);
    let prune_every = cfg.prune_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(prune_every);
        loop {
            ticker.tick().await;
            pruner.prune(OffsetDateTime::now_utc());
        }
    });

    // Clean stale socket
    let query_socket = PathBuf::from(&cfg.query_socket);
    let _ = std::fs::remove_file(&query_socket);

    let server = QueryServer {
        views: Arc::new(Views::standard()),
        collector,
        router,
        admin_controls: cfg.admin_controls,
        subscribe_interval: cfg.subscribe_interval(),
    };

    tokio::select! {
        res = server.run(&query_socket) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            let _ = std::fs::remove_file(&query_socket);
            Ok(())
        }
    }
}
