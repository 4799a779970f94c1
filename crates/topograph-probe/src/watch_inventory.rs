use anyhow::Result;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::inventory::Inventory;
use crate::reporter::Reporter;

const COALESCE_WINDOW: Duration = Duration::from_millis(250);

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

fn touches(event: &notify::Event, target: &Path) -> bool {
    is_relevant(&event.kind) && event.paths.iter().any(|p| p.file_name() == target.file_name())
}

/// Watches the inventory file and reloads it after a burst of changes settles.
///
/// The parent directory is watched so editors that replace the file by rename
/// are picked up too.
pub fn spawn(path: PathBuf, reporter: Reporter) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // notify callback thread -> tokio channel
    let (raw_tx, mut raw_rx) = mpsc::channel::<()>(64);
    let target = path.clone();
    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) if touches(&event, &target) => {
                let _ = raw_tx.try_send(());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "inventory watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %path.display(), "watching inventory");

    tokio::spawn(async move {
        let _watcher = watcher;
        let mut pending = false;
        let mut tick = tokio::time::interval(COALESCE_WINDOW);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = raw_rx.recv() => {
                    if changed.is_none() {
                        break;
                    }
                    pending = true;
                }
                _ = tick.tick() => {
                    if !pending {
                        continue;
                    }
                    pending = false;
                    match Inventory::load(&path) {
                        Ok(inventory) => reporter.replace_inventory(inventory).await,
                        // keep serving the previous inventory
                        Err(err) => tracing::warn!(error = %format!("{err:#}"), "inventory reload failed"),
                    }
                }
            }
        }
    });

    Ok(())
}
