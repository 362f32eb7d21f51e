//! The relay turning store notifications into published records.

use crate::core::{CanonicalEventRecord, ConfigurationChangeEvent};
use crate::error::{RelayError, Result};
use crate::notify::EventSink;
use crate::sources::ConfigStore;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::RelayMetrics;

/// Relays configuration change notifications to an event sink.
///
/// For every notification the relay fetches the unit's current state from
/// its [`ConfigStore`] (unless the unit was deleted), normalizes it into a
/// [`CanonicalEventRecord`] and publishes that record to its [`EventSink`]
/// under a fixed topic.
///
/// The relay holds no mutable state: it is cheap to clone, and
/// [`on_change`](Self::on_change) may be called from any number of threads
/// at once. Ordering between notifications is not preserved.
///
/// # Examples
///
/// ```rust
/// use config_relay::prelude::*;
/// use config_relay::notify::SubscriberRegistry;
/// use config_relay::sources::MemoryStore;
/// use serde_json::json;
///
/// # fn example() -> Result<()> {
/// let store = MemoryStore::new();
/// let subscribers = SubscriberRegistry::new();
/// let _handle = subscribers.subscribe("config/changes", |_, record| {
///     println!("{} -> {:?}", record.pid, record.properties);
/// });
///
/// let relay = ChangeRelay::builder()
///     .with_store(store.clone())
///     .with_sink(subscribers)
///     .build()?;
///
/// let change = store.update("app.cfg", [("level".to_string(), json!("debug"))].into())?;
/// relay.on_change(&change)?;
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Clone)]
pub struct ChangeRelay {
    store: Arc<dyn ConfigStore>,
    sink: Arc<dyn EventSink>,
    topic: Arc<str>,
    #[cfg(feature = "metrics")]
    metrics: Option<RelayMetrics>,
}

impl ChangeRelay {
    /// Create a relay from its collaborators.
    ///
    /// Prefer [`ChangeRelay::builder()`], which validates the topic.
    pub(crate) fn from_parts(
        store: Arc<dyn ConfigStore>,
        sink: Arc<dyn EventSink>,
        topic: String,
        #[cfg(feature = "metrics")] metrics: Option<RelayMetrics>,
    ) -> Self {
        Self {
            store,
            sink,
            topic: topic.into(),
            #[cfg(feature = "metrics")]
            metrics,
        }
    }

    /// The topic records are published under.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Handle one change notification.
    ///
    /// Publishes exactly one record on success. A unit that is gone by the
    /// time it is fetched is published like a deletion.
    ///
    /// # Errors
    ///
    /// - [`RelayError::StoreError`] if the store failed; nothing is published
    /// - [`RelayError::SinkError`] if the sink rejected the record
    pub fn on_change(&self, change: &ConfigurationChangeEvent) -> Result<()> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(RelayMetrics::start);

        let record = match self.normalize(change) {
            Ok(record) => record,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(pid = change.pid(), store = %self.store.name(), error = %e, "failed to fetch configuration");
                #[cfg(feature = "metrics")]
                self.observe_since(timer, RelayMetrics::record_store_failure);
                return Err(e);
            }
        };

        if let Err(e) = self.sink.publish(&self.topic, &record) {
            #[cfg(feature = "tracing")]
            tracing::warn!(pid = change.pid(), sink = %self.sink.name(), error = %e, "failed to publish configuration change");
            #[cfg(feature = "metrics")]
            self.observe_since(timer, RelayMetrics::record_sink_failure);
            return Err(e);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(pid = change.pid(), kind = %change.kind(), topic = %self.topic, "relayed configuration change");
        #[cfg(feature = "metrics")]
        self.observe_since(timer, |metrics, start| {
            metrics.record_published(start, change.kind().as_str())
        });

        Ok(())
    }

    /// Build the record for `change` without publishing it.
    ///
    /// Performs at most one store fetch: none for deletions, exactly one
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StoreError`] (or any other non-`NotFound` store
    /// error) unchanged.
    pub fn normalize(&self, change: &ConfigurationChangeEvent) -> Result<CanonicalEventRecord> {
        if change.kind().is_deletion() {
            return Ok(CanonicalEventRecord::deleted(change));
        }

        match self.store.fetch(change.pid()) {
            Ok(snapshot) => Ok(CanonicalEventRecord::from_snapshot(change, snapshot)),
            // Deleted between notification and fetch
            Err(RelayError::NotFound { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(pid = change.pid(), kind = %change.kind(), "configuration vanished before fetch, relaying as deleted");
                #[cfg(feature = "metrics")]
                self.observe(RelayMetrics::record_degraded);
                Ok(CanonicalEventRecord::deleted(change))
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(feature = "metrics")]
    fn observe(&self, record: impl FnOnce(&RelayMetrics)) {
        if let Some(metrics) = &self.metrics {
            record(metrics);
        }
    }

    #[cfg(feature = "metrics")]
    fn observe_since(
        &self,
        timer: Option<std::time::Instant>,
        record: impl FnOnce(&RelayMetrics, std::time::Instant),
    ) {
        if let (Some(metrics), Some(start)) = (&self.metrics, timer) {
            record(metrics, start);
        }
    }

    /// Relay every notification received on `notifications` until the channel closes.
    ///
    /// Errors are handed to `on_error` together with the notification that
    /// caused them; relaying continues with the next notification.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use config_relay::prelude::*;
    /// use config_relay::notify::{BroadcastSink, StoreWatcher};
    /// use config_relay::sources::FileStore;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<()> {
    /// let store = FileStore::new("/etc/myapp/conf.d");
    /// let (_watcher, rx) = StoreWatcher::new(&store, Duration::from_millis(250))?;
    ///
    /// let relay = ChangeRelay::builder()
    ///     .with_store(store)
    ///     .with_sink(BroadcastSink::new())
    ///     .build()?;
    ///
    /// relay
    ///     .run(rx, |change, err| eprintln!("{}: {}", change.pid(), err))
    ///     .await;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "file-watch")]
    pub async fn run<F>(
        &self,
        mut notifications: tokio::sync::mpsc::Receiver<ConfigurationChangeEvent>,
        mut on_error: F,
    ) where
        F: FnMut(&ConfigurationChangeEvent, RelayError),
    {
        while let Some(change) = notifications.recv().await {
            if let Err(e) = self.on_change(&change) {
                on_error(&change, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChangeKind, ConfigurationSnapshot, Properties};
    use crate::notify::SubscriberRegistry;
    use crate::sources::MemoryStore;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that fails every fetch and counts calls.
    struct FailingStore {
        calls: AtomicUsize,
    }

    impl ConfigStore for FailingStore {
        fn fetch(&self, _pid: &str) -> Result<ConfigurationSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::StoreError("permission denied".to_string()))
        }

        fn name(&self) -> String {
            "failing".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(String, CanonicalEventRecord)>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()> {
            self.records.lock().push((topic.to_string(), record.clone()));
            Ok(())
        }

        fn name(&self) -> String {
            "recording".to_string()
        }
    }

    struct RejectingSink;

    impl EventSink for RejectingSink {
        fn publish(&self, topic: &str, _record: &CanonicalEventRecord) -> Result<()> {
            Err(RelayError::sink(topic, "bus closed"))
        }

        fn name(&self) -> String {
            "rejecting".to_string()
        }
    }

    fn relay(store: impl ConfigStore + 'static, sink: Arc<RecordingSink>) -> ChangeRelay {
        ChangeRelay::builder()
            .with_store(store)
            .with_sink(sink)
            .build()
            .unwrap()
    }

    #[test]
    fn test_updated_publishes_snapshot() {
        let store = MemoryStore::new();
        store.create("app.cfg").unwrap();
        store
            .set_location("app.cfg", Some("file:/etc/app.cfg".to_string()))
            .unwrap();
        let change = store
            .update("app.cfg", Properties::from([("level".to_string(), json!("debug"))]))
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        relay(store, Arc::clone(&sink)).on_change(&change).unwrap();

        let records = sink.records.lock();
        assert_eq!(records.len(), 1);
        let (topic, record) = &records[0];
        assert_eq!(topic, "config/changes");
        assert_eq!(record.pid, "app.cfg");
        assert_eq!(record.factory_pid, None);
        assert_eq!(record.location.as_deref(), Some("file:/etc/app.cfg"));
        assert_eq!(record.properties["level"], json!("debug"));
    }

    #[test]
    fn test_deleted_skips_store() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(Arc::clone(&store), Arc::clone(&sink));

        let change = ConfigurationChangeEvent::new("app.cfg", ChangeKind::Deleted).unwrap();
        relay.on_change(&change).unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        let records = sink.records.lock();
        assert!(records[0].1.properties.is_empty());
        assert!(records[0].1.location.is_none());
    }

    #[test]
    fn test_not_found_degrades_to_deleted() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(MemoryStore::new(), Arc::clone(&sink));

        let change = ConfigurationChangeEvent::new("gone", ChangeKind::FactoryUpdated)
            .unwrap()
            .with_factory_pid("worker");
        relay.on_change(&change).unwrap();

        let deleted = ConfigurationChangeEvent::new("gone", ChangeKind::Deleted)
            .unwrap()
            .with_factory_pid("worker");
        relay.on_change(&deleted).unwrap();

        let records = sink.records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], records[1]);
        assert_eq!(records[0].1.factory_pid.as_deref(), Some("worker"));
    }

    #[test]
    fn test_store_error_publishes_nothing() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(Arc::clone(&store), Arc::clone(&sink));

        let change = ConfigurationChangeEvent::new("app.cfg", ChangeKind::Updated).unwrap();
        let err = relay.on_change(&change).unwrap_err();

        assert!(matches!(err, RelayError::StoreError(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(sink.records.lock().is_empty());
    }

    #[test]
    fn test_sink_error_propagates() {
        let store = MemoryStore::new();
        let change = store.update("app.cfg", Properties::new()).unwrap();

        let relay = ChangeRelay::builder()
            .with_store(store)
            .with_sink(RejectingSink)
            .build()
            .unwrap();

        assert!(matches!(
            relay.on_change(&change),
            Err(RelayError::SinkError { .. })
        ));
    }

    #[test]
    fn test_created_without_properties_publishes_empty_map() {
        let store = MemoryStore::new();
        store.create("fresh").unwrap();
        let sink = Arc::new(RecordingSink::default());

        let change = ConfigurationChangeEvent::new("fresh", ChangeKind::LocationChanged).unwrap();
        relay(store, Arc::clone(&sink)).on_change(&change).unwrap();

        let records = sink.records.lock();
        assert!(records[0].1.properties.is_empty());
    }

    #[test]
    fn test_published_record_is_independent_of_store() {
        let store = MemoryStore::new();
        let change = store
            .update("app", Properties::from([("a".to_string(), json!(1))]))
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        relay(store.clone(), Arc::clone(&sink)).on_change(&change).unwrap();

        store
            .update("app", Properties::from([("a".to_string(), json!(2))]))
            .unwrap();

        assert_eq!(sink.records.lock()[0].1.properties["a"], json!(1));
    }

    #[test]
    fn test_custom_topic_with_registry() {
        let store = MemoryStore::new();
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        let _handle = registry.subscribe("web/*", move |topic, _| {
            assert_eq!(topic, "web/config");
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        let relay = ChangeRelay::builder()
            .with_store(store.clone())
            .with_sink(registry)
            .with_topic("web/config")
            .build()
            .unwrap();
        assert_eq!(relay.topic(), "web/config");

        let change = store.update("app", Properties::new()).unwrap();
        relay.on_change(&change).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[cfg(feature = "file-watch")]
    #[tokio::test]
    async fn test_run_drains_channel() {
        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(store.clone(), Arc::clone(&sink));

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(store.update("a", Properties::new()).unwrap()).await.unwrap();
        tx.send(ConfigurationChangeEvent::new("b", ChangeKind::Deleted).unwrap())
            .await
            .unwrap();
        drop(tx);

        let mut errors = Vec::new();
        relay.run(rx, |change, err| errors.push((change.pid().to_string(), err))).await;

        assert!(errors.is_empty());
        let pids: Vec<_> = sink.records.lock().iter().map(|(_, r)| r.pid.clone()).collect();
        assert_eq!(pids, vec!["a", "b"]);
    }

    #[cfg(feature = "file-watch")]
    #[tokio::test]
    async fn test_run_reports_errors_and_continues() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(store, Arc::clone(&sink));

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(ConfigurationChangeEvent::new("a", ChangeKind::Updated).unwrap())
            .await
            .unwrap();
        tx.send(ConfigurationChangeEvent::new("b", ChangeKind::Deleted).unwrap())
            .await
            .unwrap();
        drop(tx);

        let mut failed = Vec::new();
        relay.run(rx, |change, _| failed.push(change.pid().to_string())).await;

        assert_eq!(failed, vec!["a"]);
        assert_eq!(sink.records.lock().len(), 1);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_metrics_do_not_change_outcomes() {
        let meter = opentelemetry::global::meter("relay-test");
        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink::default());
        let relay = ChangeRelay::builder()
            .with_store(store.clone())
            .with_sink(Arc::clone(&sink))
            .with_metrics(meter.clone())
            .build()
            .unwrap();

        let change = store.update("a", Properties::new()).unwrap();
        relay.on_change(&change).unwrap();
        store.delete("a").unwrap();
        relay.on_change(&change).unwrap();
        assert_eq!(sink.records.lock().len(), 2);

        let failing = ChangeRelay::builder()
            .with_store(FailingStore {
                calls: AtomicUsize::new(0),
            })
            .with_sink(RejectingSink)
            .with_metrics(meter.clone())
            .build()
            .unwrap();
        assert!(matches!(
            failing.on_change(&change),
            Err(RelayError::StoreError(_))
        ));

        let deleted = ConfigurationChangeEvent::new("a", ChangeKind::Deleted).unwrap();
        assert!(matches!(
            failing.on_change(&deleted),
            Err(RelayError::SinkError { .. })
        ));
    }
}
