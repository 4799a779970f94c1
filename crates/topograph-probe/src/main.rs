mod config;
mod control;
mod inventory;
mod reporter;
mod resources;
mod server;
mod watch_inventory;

use anyhow::Result;
use inventory::Inventory;
use reporter::Reporter;
use tokio::sync::broadcast;
use topograph_core::Msg;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = config::parse_args()?;

    let inventory = Inventory::load(&config.inventory)?;
    tracing::info!(
        probe_id = %config.probe_id,
        inventory = %config.inventory.display(),
        resources = inventory.resources.len(),
        interval_ms = config.interval.as_millis() as u64,
        "probe starting"
    );

    // Clean stale socket
    let _ = std::fs::remove_file(&config.socket);

    // broadcast so several aggregators can subscribe
    let (bus_tx, _bus_rx) = broadcast::channel::<Msg>(64);
    let reporter = Reporter::new(config.probe_id.clone(), config.interval, inventory, bus_tx);

    watch_inventory::spawn(config.inventory.clone(), reporter.clone())?;
    tokio::spawn(reporter.clone().run(config.interval));

    tokio::select! {
        res = server::run(&config.socket, reporter) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            let _ = std::fs::remove_file(&config.socket);
            Ok(())
        }
    }
}
