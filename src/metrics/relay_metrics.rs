//! Relay metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for relayed configuration changes.
///
/// Tracks published, degraded and failed notifications and the latency of
/// each relay call using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use config_relay::metrics::RelayMetrics;
/// use opentelemetry::global;
///
/// let metrics = RelayMetrics::new(global::meter("config-relay"));
///
/// let timer = metrics.start();
/// // ... relay a notification ...
/// metrics.record_published(timer, "updated");
/// ```
#[derive(Clone)]
pub struct RelayMetrics {
    published: Counter<u64>,
    degraded: Counter<u64>,
    store_failures: Counter<u64>,
    sink_failures: Counter<u64>,
    publish_duration: Histogram<f64>,
}

impl RelayMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let published = meter
            .u64_counter("config_relay.events.published")
            .with_description("Number of records published to the sink")
            .build();

        let degraded = meter
            .u64_counter("config_relay.events.degraded")
            .with_description("Number of updates published as deletions because the unit was gone")
            .build();

        let store_failures = meter
            .u64_counter("config_relay.store_failures")
            .with_description("Number of notifications dropped on store errors")
            .build();

        let sink_failures = meter
            .u64_counter("config_relay.sink_failures")
            .with_description("Number of records the sink rejected")
            .build();

        let publish_duration = meter
            .f64_histogram("config_relay.publish.duration")
            .with_description("Duration of relay calls in seconds")
            .with_unit("s")
            .build();

        Self {
            published,
            degraded,
            store_failures,
            sink_failures,
            publish_duration,
        }
    }

    /// Start timing a relay call.
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Record a successful publish of a change of `kind`.
    pub fn record_published(&self, start: Instant, kind: &'static str) {
        self.published.add(1, &[KeyValue::new("kind", kind)]);
        self.publish_duration
            .record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record an update that was published as a deletion.
    pub fn record_degraded(&self) {
        self.degraded.add(1, &[]);
    }

    /// Record a notification dropped because the store failed.
    pub fn record_store_failure(&self, start: Instant) {
        self.store_failures.add(1, &[]);
        self.publish_duration
            .record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a record the sink rejected.
    pub fn record_sink_failure(&self, start: Instant) {
        self.sink_failures.add(1, &[]);
        self.publish_duration
            .record(start.elapsed().as_secs_f64(), &[]);
    }
}
