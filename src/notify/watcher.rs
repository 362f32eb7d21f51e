//! File watching that turns directory changes into change notifications.

use crate::core::{ChangeKind, ConfigurationChangeEvent};
use crate::error::{RelayError, Result};
use crate::sources::FileStore;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

/// Notification source for a [`FileStore`] directory.
///
/// Uses the `notify` crate to watch the store directory and emits one
/// [`ConfigurationChangeEvent`] per changed unit. Events for the same pid are
/// debounced; a change landing inside the window is re-emitted once the
/// window closes, so the last state of a file is always announced.
///
/// The change kind reflects the file's state when the event is emitted:
/// `Deleted` if no file backs the pid anymore, otherwise `Updated` (or
/// `FactoryUpdated` for factory instances).
///
/// Must be created inside a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use config_relay::notify::StoreWatcher;
/// use config_relay::sources::FileStore;
/// use std::time::Duration;
///
/// # async fn example() -> config_relay::error::Result<()> {
/// let store = FileStore::new("/etc/myapp/conf.d");
/// let (_watcher, mut rx) = StoreWatcher::new(&store, Duration::from_millis(250))?;
///
/// while let Some(change) = rx.recv().await {
///     println!("{} {}", change.pid(), change.kind());
/// }
/// # Ok(())
/// # }
/// ```
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
    debounce_duration: Duration,
}

impl StoreWatcher {
    /// Start watching the directory of `store`.
    ///
    /// # Returns
    ///
    /// Returns a tuple of (StoreWatcher, receiver channel). Dropping the
    /// watcher stops the notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or the underlying
    /// file watcher cannot be created.
    pub fn new(
        store: &FileStore,
        debounce_duration: Duration,
    ) -> Result<(Self, mpsc::Receiver<ConfigurationChangeEvent>)> {
        let dir = store.dir().canonicalize().map_err(|e| {
            RelayError::WatchError(format!(
                "Failed to resolve {}: {}",
                store.dir().display(),
                e
            ))
        })?;

        let (tx, rx) = mpsc::channel(100);

        // Channel for raw events from notify
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    let _ = event_tx.send(event);
                }
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "file watcher reported an error");
            }
        })
        .map_err(|e| RelayError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| RelayError::WatchError(format!("Failed to watch {}: {}", dir.display(), e)))?;

        let store = FileStore::new(dir.clone());
        let debounce = debounce_duration;

        // Debounce per pid and translate paths into notifications
        tokio::spawn(async move {
            let mut emitted = EmitLog::default();
            let pending: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

            while let Some(event) = event_rx.recv().await {
                for pid in event.paths.iter().filter_map(|p| FileStore::pid_for_path(p)) {
                    let now = Instant::now();
                    match emitted.since_last(&pid, now) {
                        Some(elapsed) if elapsed < debounce => {
                            if !pending.lock().insert(pid.clone()) {
                                continue;
                            }
                            // Schedule a delayed notification
                            let remaining = debounce - elapsed;
                            let tx = tx.clone();
                            let store = store.clone();
                            let pending = Arc::clone(&pending);
                            tokio::spawn(async move {
                                sleep(remaining).await;
                                pending.lock().remove(&pid);
                                if let Some(change) = current_change(&store, &pid) {
                                    let _ = tx.send(change).await;
                                }
                            });
                        }
                        _ => {
                            let Some(change) = current_change(&store, &pid) else {
                                continue;
                            };
                            emitted.record(&change, now);
                            if tx.send(change).await.is_err() {
                                // Receiver dropped, exit
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                _watcher: watcher,
                dir,
                debounce_duration,
            },
            rx,
        ))
    }

    /// The canonical path of the watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }
}

/// When each live pid last had a notification emitted.
///
/// Deleted pids are forgotten so the log only tracks files that exist.
#[derive(Default)]
struct EmitLog {
    last_sent: HashMap<String, Instant>,
}

impl EmitLog {
    fn since_last(&self, pid: &str, now: Instant) -> Option<Duration> {
        self.last_sent.get(pid).map(|sent| now.duration_since(*sent))
    }

    fn record(&mut self, change: &ConfigurationChangeEvent, now: Instant) {
        if change.kind().is_deletion() {
            self.last_sent.remove(change.pid());
        } else {
            self.last_sent.insert(change.pid().to_string(), now);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.last_sent.len()
    }
}

/// The notification describing the current state of `pid` in `store`.
fn current_change(store: &FileStore, pid: &str) -> Option<ConfigurationChangeEvent> {
    let factory_pid = FileStore::factory_pid_of(pid);
    let kind = match (store.resolve(pid), factory_pid) {
        (None, _) => ChangeKind::Deleted,
        (Some(_), Some(_)) => ChangeKind::FactoryUpdated,
        (Some(_), None) => ChangeKind::Updated,
    };
    let change = ConfigurationChangeEvent::new(pid, kind).ok()?;
    Some(match factory_pid {
        Some(factory_pid) => change.with_factory_pid(factory_pid),
        None => change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn next_of_kind(
        rx: &mut mpsc::Receiver<ConfigurationChangeEvent>,
        kind: ChangeKind,
    ) -> ConfigurationChangeEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                let change = rx.recv().await.expect("watcher channel closed");
                if change.kind() == kind {
                    return change;
                }
            }
        })
        .await
        .expect("timed out waiting for change")
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let (watcher, _rx) = StoreWatcher::new(&store, Duration::from_millis(100)).unwrap();
        assert_eq!(watcher.debounce_duration(), Duration::from_millis(100));
        assert_eq!(watcher.dir(), temp_dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_watch_nonexistent_dir() {
        let store = FileStore::new("/nonexistent/conf.d");
        let result = StoreWatcher::new(&store, Duration::from_millis(100));
        assert!(matches!(result, Err(RelayError::WatchError(_))));
    }

    #[tokio::test]
    async fn test_file_write_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let (_watcher, mut rx) = StoreWatcher::new(&store, Duration::from_millis(50)).unwrap();

        let config_path = temp_dir.path().join("app.cfg.yaml");
        fs::write(&config_path, "level: debug").unwrap();

        let change = next_of_kind(&mut rx, ChangeKind::Updated).await;
        assert_eq!(change.pid(), "app.cfg");
        assert!(change.factory_pid().is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::remove_file(&config_path).unwrap();

        let change = next_of_kind(&mut rx, ChangeKind::Deleted).await;
        assert_eq!(change.pid(), "app.cfg");
    }

    #[tokio::test]
    async fn test_factory_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let (_watcher, mut rx) = StoreWatcher::new(&store, Duration::from_millis(50)).unwrap();

        fs::write(temp_dir.path().join("worker~east.json"), r#"{"threads": 4}"#).unwrap();

        let change = next_of_kind(&mut rx, ChangeKind::FactoryUpdated).await;
        assert_eq!(change.pid(), "worker~east");
        assert_eq!(change.factory_pid(), Some("worker"));
    }

    #[tokio::test]
    async fn test_ignores_unsupported_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let (_watcher, mut rx) = StoreWatcher::new(&store, Duration::from_millis(50)).unwrap();

        fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(temp_dir.path().join("app.toml"), "level = \"info\"").unwrap();

        let change = next_of_kind(&mut rx, ChangeKind::Updated).await;
        assert_eq!(change.pid(), "app");
    }

    #[test]
    fn test_current_change_reflects_file_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let change = current_change(&store, "gone").unwrap();
        assert_eq!(change.kind(), ChangeKind::Deleted);

        fs::write(temp_dir.path().join("present.yml"), "a: 1").unwrap();
        let change = current_change(&store, "present").unwrap();
        assert_eq!(change.kind(), ChangeKind::Updated);
    }

    #[test]
    fn test_emit_log_forgets_deleted_pids() {
        let mut emitted = EmitLog::default();
        let start = Instant::now();

        let updated = ConfigurationChangeEvent::new("app", ChangeKind::Updated).unwrap();
        emitted.record(&updated, start);
        assert_eq!(emitted.len(), 1);
        assert_eq!(
            emitted.since_last("app", start + Duration::from_millis(10)),
            Some(Duration::from_millis(10))
        );

        let deleted = ConfigurationChangeEvent::new("app", ChangeKind::Deleted).unwrap();
        emitted.record(&deleted, start + Duration::from_millis(20));
        assert_eq!(emitted.len(), 0);
        assert_eq!(emitted.since_last("app", start), None);
    }
}
