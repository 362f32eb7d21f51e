//! Output sinks receiving canonical records.

use crate::core::{CanonicalEventRecord, PublishedEvent};
use crate::error::{RelayError, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Trait for the event bus the relay publishes to.
///
/// Delivery guarantees (at-most-once, at-least-once) belong to the sink.
/// Implementations must accept concurrent `publish` calls.
pub trait EventSink: Send + Sync {
    /// Publish `record` under `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SinkError`] if the record could not be handed off.
    fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()>;

    /// Get a human-readable name for this sink (for logging/debugging).
    fn name(&self) -> String;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()> {
        (**self).publish(topic, record)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Sink writing each record as one line of JSON.
///
/// Every line is a serialized [`PublishedEvent`], the framing a server-push
/// endpoint streams to its clients.
///
/// # Examples
///
/// ```rust
/// use config_relay::notify::{EventSink, JsonWriterSink};
/// use config_relay::core::CanonicalEventRecord;
///
/// let sink = JsonWriterSink::new(Vec::new());
/// let record = CanonicalEventRecord {
///     pid: "app.cfg".to_string(),
///     factory_pid: None,
///     location: None,
///     properties: Default::default(),
/// };
/// sink.publish("config/changes", &record).unwrap();
///
/// let out = String::from_utf8(sink.into_inner()).unwrap();
/// assert_eq!(
///     out,
///     "{\"topic\":\"config/changes\",\"record\":{\"pid\":\"app.cfg\",\"properties\":{}}}\n"
/// );
/// ```
pub struct JsonWriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonWriterSink<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonWriterSink<W> {
    fn publish(&self, topic: &str, record: &CanonicalEventRecord) -> Result<()> {
        let event = PublishedEvent {
            topic: topic.to_string(),
            record: record.clone(),
        };
        let mut line = serde_json::to_vec(&event).map_err(|e| RelayError::sink(topic, e))?;
        line.push(b'\n');

        // One lock per line keeps concurrent records from interleaving
        let mut writer = self.writer.lock();
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|e| RelayError::sink(topic, e))
    }

    fn name(&self) -> String {
        "json-writer".to_string()
    }
}
