//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::EdgeConfig;

/// Watches one config file and pushes every valid new version to a channel.
///
/// Keep the returned `RecommendedWatcher` alive; dropping it stops the watch.
pub struct ConfigWatcher {
    path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Start watching. Invalid files are logged and skipped, so the server
    /// keeps the last good configuration.
    pub fn spawn(
        self,
    ) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<EdgeConfig>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            tracing::info!(path = %path.display(), "Configuration reloaded");
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Rejected configuration change, keeping current configuration"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");

        Ok((watcher, rx))
    }
}
