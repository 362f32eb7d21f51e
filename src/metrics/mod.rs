//! Built-in metrics for relayed configuration changes.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Published records, labelled by change kind
//! - Degraded updates (unit gone before it could be fetched)
//! - Store and sink failures
//! - Relay call duration
//!
//! # Examples
//!
//! ```rust,no_run
//! use config_relay::prelude::*;
//! use config_relay::notify::SubscriberRegistry;
//! use config_relay::sources::MemoryStore;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let relay = ChangeRelay::builder()
//!     .with_store(MemoryStore::new())
//!     .with_sink(SubscriberRegistry::new())
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod relay_metrics;

pub use relay_metrics::RelayMetrics;
