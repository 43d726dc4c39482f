use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::command::server;
use crate::configuration::Configuration;

pub struct ConfigWatcher {
    _handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn new(
        config_path: &str,
        server: Arc<server::Command>,
    ) -> Result<Self, crate::command::Error> {
        info!("Setting up config watcher for: {}", config_path);

        let config_file_path = std::fs::canonicalize(PathBuf::from(config_path))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = watch_config_loop(config_file_path, server).await {
                error!("Config watcher failed: {}", e);
            }
        });

        Ok(Self { _handle: handle })
    }
}

fn is_content_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    )
}

async fn watch_config_loop(
    config_path: PathBuf,
    server: Arc<server::Command>,
) -> Result<(), crate::command::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.blocking_send(event);
        }
    })?;
    watcher.watch(&config_path, RecursiveMode::NonRecursive)?;

    while let Some(event) = rx.recv().await {
        if is_content_change(&event) && event.paths.iter().any(|p| p == &config_path) {
            info!("Configuration file changed, reloading");
            reload(&server, &config_path);
        }
    }

    error!("Config watcher channel closed");
    Ok(())
}

/// A configuration that fails to load or validate leaves the running one in place.
fn reload(server: &server::Command, config_path: &Path) {
    let config = match Configuration::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reload configuration: {e}");
            return;
        }
    };

    if let Err(e) = server.notify_config_change(&config) {
        error!("Failed to notify server of configuration change: {e}");
    } else {
        info!("Configuration reloaded");
    }
}
