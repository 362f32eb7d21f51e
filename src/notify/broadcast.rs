//! Fan-out of relayed records over a tokio broadcast channel.

use super::EventSink;
use crate::core::{CanonicalEventRecord, PublishedEvent};
use crate::error::Result;
use crate::settings::RelaySettings;
use tokio::sync::broadcast;

/// Default channel capacity for relayed records.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Sink broadcasting every record to all current receivers.
///
/// Receivers that fall more than the channel capacity behind observe
/// `RecvError::Lagged` and skip ahead; publishing with no receivers succeeds
/// and delivers nothing. Delivery is at-most-once.
///
/// # Examples
///
/// ```rust
/// use config_relay::notify::{BroadcastSink, EventSink};
/// use config_relay::core::CanonicalEventRecord;
///
/// let sink = BroadcastSink::new();
/// let mut rx = sink.subscribe();
///
/// let record = CanonicalEventRecord {
///     pid: "app.cfg".to_string(),
///     factory_pid: None,
///     location: None,
///     properties: Default::default(),
/// };
/// sink.publish("config/changes", &record).unwrap();
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.topic, "config/changes");
/// assert_eq!(event.record.pid, "app.cfg");
/// ```
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastSink {
    /// Create a new sink with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new sink with specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, as `tokio::sync::broadcast::channel` does.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a sink sized by `settings.channel_capacity`.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self::with_capacity(settings.channel_capacity)
    }

    /// Subscribe to relayed records.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()> {
        let event = PublishedEvent {
            topic: topic.to_string(),
            record: record.clone(),
        };
        // An error only means there is currently nobody listening
        let _ = self.sender.send(event);
        Ok(())
    }

    fn name(&self) -> String {
        "broadcast".to_string()
    }
}
