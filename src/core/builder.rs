//! Builder for constructing ChangeRelay instances.

use crate::core::ChangeRelay;
use crate::error::{RelayError, Result};
use crate::notify::EventSink;
use crate::settings::{DEFAULT_TOPIC, RelaySettings};
use crate::sources::ConfigStore;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::RelayMetrics;

/// Builder for constructing a `ChangeRelay`.
///
/// The store and sink are required; the topic defaults to
/// [`DEFAULT_TOPIC`].
///
/// # Examples
///
/// ```rust
/// use config_relay::prelude::*;
/// use config_relay::notify::SubscriberRegistry;
/// use config_relay::sources::MemoryStore;
///
/// # fn example() -> Result<()> {
/// let relay = ChangeRelay::builder()
///     .with_store(MemoryStore::new())
///     .with_sink(SubscriberRegistry::new())
///     .with_topic("web/config")
///     .build()?;
/// assert_eq!(relay.topic(), "web/config");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct ChangeRelayBuilder {
    store: Option<Arc<dyn ConfigStore>>,
    sink: Option<Arc<dyn EventSink>>,
    topic: String,
    #[cfg(feature = "metrics")]
    metrics: Option<RelayMetrics>,
}

impl ChangeRelayBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            store: None,
            sink: None,
            topic: DEFAULT_TOPIC.to_string(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the store notifications are resolved against.
    pub fn with_store<S: ConfigStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the sink records are published to.
    pub fn with_sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the topic records are published under.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Apply loaded relay settings.
    pub fn with_settings(self, settings: &RelaySettings) -> Self {
        self.with_topic(settings.topic.clone())
    }

    /// Record OpenTelemetry metrics on `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(RelayMetrics::new(meter));
        self
    }

    /// Build the relay.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BuildError`] if the store or sink is missing or
    /// the topic is empty.
    pub fn build(self) -> Result<ChangeRelay> {
        let store = self
            .store
            .ok_or_else(|| RelayError::BuildError("no configuration store set".to_string()))?;
        let sink = self
            .sink
            .ok_or_else(|| RelayError::BuildError("no event sink set".to_string()))?;

        if self.topic.trim().is_empty() {
            return Err(RelayError::BuildError("topic must not be empty".to_string()));
        }

        Ok(ChangeRelay::from_parts(
            store,
            sink,
            self.topic,
            #[cfg(feature = "metrics")]
            self.metrics,
        ))
    }
}

impl Default for ChangeRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeRelay {
    /// Create a new builder for constructing a relay.
    pub fn builder() -> ChangeRelayBuilder {
        ChangeRelayBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::SubscriberRegistry;
    use crate::sources::MemoryStore;

    #[test]
    fn test_default_topic() {
        let relay = ChangeRelayBuilder::new()
            .with_store(MemoryStore::new())
            .with_sink(SubscriberRegistry::new())
            .build()
            .unwrap();
        assert_eq!(relay.topic(), "config/changes");
    }

    #[test]
    fn test_missing_store() {
        let result = ChangeRelayBuilder::new()
            .with_sink(SubscriberRegistry::new())
            .build();
        assert!(matches!(result, Err(RelayError::BuildError(_))));
    }

    #[test]
    fn test_missing_sink() {
        let result = ChangeRelayBuilder::new()
            .with_store(MemoryStore::new())
            .build();
        assert!(matches!(result, Err(RelayError::BuildError(_))));
    }

    #[test]
    fn test_empty_topic() {
        let result = ChangeRelayBuilder::new()
            .with_store(MemoryStore::new())
            .with_sink(SubscriberRegistry::new())
            .with_topic("")
            .build();
        assert!(matches!(result, Err(RelayError::BuildError(_))));
    }

    #[test]
    fn test_with_settings() {
        let settings = RelaySettings {
            topic: "web/config".to_string(),
            ..Default::default()
        };
        let relay = ChangeRelayBuilder::new()
            .with_store(MemoryStore::new())
            .with_sink(SubscriberRegistry::new())
            .with_settings(&settings)
            .build()
            .unwrap();
        assert_eq!(relay.topic(), "web/config");
    }
}
