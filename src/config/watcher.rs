//! Configuration hot reload.
//!
//! Editors often emit several events for one save, so a reload is only
//! forwarded when the parsed settings differ from the last ones delivered.
//! A broken edit is logged and the running configuration stays in place.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::BreakerSettings;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one settings file and delivers validated changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<BreakerSettings>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded settings.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BreakerSettings>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops delivery.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let reloader = Reloader::new(self.path.clone(), self.updates);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reloader.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Loads the file and forwards settings that actually changed.
struct Reloader {
    path: PathBuf,
    updates: mpsc::UnboundedSender<BreakerSettings>,
    last: Mutex<Option<BreakerSettings>>,
}

impl Reloader {
    fn new(path: PathBuf, updates: mpsc::UnboundedSender<BreakerSettings>) -> Self {
        let last = load_config(&path).ok();
        Self {
            path,
            updates,
            last: Mutex::new(last),
        }
    }

    fn reload(&self) -> Option<Result<(), ConfigError>> {
        let settings = match load_config(&self.path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Config reload rejected, keeping current settings"
                );
                return Some(Err(e));
            }
        };

        // A panicked reload leaves the cache whole; keep using it.
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(&settings) {
            tracing::debug!("Config file touched without changes");
            return None;
        }

        tracing::info!(
            path = %self.path.display(),
            overrides = settings.breakers.len(),
            "Config change detected, reloading"
        );
        *last = Some(settings.clone());
        let _ = self.updates.send(settings);
        Some(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_reload_forwards_only_changes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("breakers.toml");
        write(&path, "[defaults]\nfailure_threshold = 3\n");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reloader = Reloader::new(path.clone(), tx);

        // Same content as at startup.
        assert!(reloader.reload().is_none());
        assert!(rx.try_recv().is_err());

        write(&path, "[defaults]\nfailure_threshold = 4\n");
        assert!(matches!(reloader.reload(), Some(Ok(()))));
        assert_eq!(rx.try_recv().unwrap().defaults.failure_threshold, 4);

        write(&path, "[defaults]\nfailure_threshold = 0\n");
        assert!(matches!(
            reloader.reload(),
            Some(Err(ConfigError::Validation(_)))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reload_survives_poisoned_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("breakers.toml");
        write(&path, "[defaults]\nfailure_threshold = 3\n");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reloader = Reloader::new(path.clone(), tx);
        let poisoned = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = reloader.last.lock();
                panic!("reload handler panicked");
            })
            .join()
        });
        assert!(poisoned.is_err());
        assert!(reloader.last.is_poisoned());

        write(&path, "[defaults]\nfailure_threshold = 6\n");
        assert!(matches!(reloader.reload(), Some(Ok(()))));
        assert_eq!(rx.try_recv().unwrap().defaults.failure_threshold, 6);
    }
}
