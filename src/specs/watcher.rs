//! Specifications file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::specs::store::SpecificationStore;

/// Reloads a `SpecificationStore` whenever its backing file changes.
pub struct SpecificationWatcher {
    path: PathBuf,
    store: Arc<SpecificationStore>,
}

impl SpecificationWatcher {
    pub fn new(path: &Path, store: Arc<SpecificationStore>) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for reloads to continue.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let store = self.store.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Specifications file change detected, reloading...");
                        match store.reload_from_file(&path) {
                            Ok(count) => {
                                tracing::info!(count, "Die specifications reloaded");
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload specifications: {}. Keeping current table.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Specifications watcher started");
        Ok(watcher)
    }
}
