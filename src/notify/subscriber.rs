//! Topic-filtered callback subscriptions.

use super::EventSink;
use crate::core::CanonicalEventRecord;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;

type Callback = Arc<dyn Fn(&str, &CanonicalEventRecord) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is automatically removed.
pub struct SubscriptionHandle {
    id: usize,
    registry: Arc<RwLock<SubscriberRegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let mut inner = self.registry.write();
        inner.subscribers.retain(|sub| sub.id != self.id);
    }
}

struct Subscriber {
    id: usize,
    filter: String,
    callback: Callback,
}

/// Internal subscriber registry state.
struct SubscriberRegistryInner {
    subscribers: Vec<Subscriber>,
    next_id: usize,
}

/// Whether `topic` is selected by `filter`.
///
/// A filter is an exact topic, `*` for every topic, or a prefix ending in
/// `/*` which selects every topic below that prefix.
///
/// ```rust
/// use config_relay::notify::topic_matches;
///
/// assert!(topic_matches("config/changes", "config/changes"));
/// assert!(topic_matches("config/*", "config/changes"));
/// assert!(topic_matches("*", "anything"));
/// assert!(!topic_matches("config/*", "config"));
/// assert!(!topic_matches("config/changes", "config/changes/extra"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if filter == "*" {
        return true;
    }
    match filter.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => topic.starts_with(prefix) && topic.len() > prefix.len(),
        _ => filter == topic,
    }
}

/// Registry of in-process subscribers to relayed records.
///
/// The registry is itself an [`EventSink`]: publishing calls every callback
/// whose topic filter matches, in the order they subscribed.
///
/// # Examples
///
/// ```rust
/// use config_relay::notify::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::new();
///
/// let handle = registry.subscribe("config/*", |topic, record| {
///     println!("{topic}: {} changed", record.pid);
/// });
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(registry.subscriber_count(), 0);
/// ```
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Subscribe to records published under topics matching `filter`.
    ///
    /// Returns a handle that can be dropped to unsubscribe. See
    /// [`topic_matches`] for the filter syntax.
    pub fn subscribe<F>(&self, filter: impl Into<String>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&str, &CanonicalEventRecord) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            filter: filter.into(),
            callback: Arc::new(callback),
        });

        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Deliver `record` to every subscriber matching `topic`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify_all(&self, topic: &str, record: &CanonicalEventRecord) -> usize {
        // Callbacks run outside the lock so they may subscribe or drop handles
        let matching: Vec<Callback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .filter(|sub| topic_matches(&sub.filter, topic))
            .map(|sub| Arc::clone(&sub.callback))
            .collect();

        for callback in &matching {
            callback(topic, record);
        }
        matching.len()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl EventSink for SubscriberRegistry {
    fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()> {
        self.notify_all(topic, record);
        Ok(())
    }

    fn name(&self) -> String {
        "subscribers".to_string()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SubscriberRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
