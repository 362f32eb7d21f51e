//! # config-relay
//!
//! Relay configuration store mutations as canonical events onto an internal event bus.
//!
//! ## Overview
//!
//! `config-relay` sits between a configuration store and the consumers that
//! want to hear about its changes (for example a server-push endpoint feeding
//! browsers). For every change notification it:
//! - Fetches the unit's current state from a [`ConfigStore`](sources::ConfigStore)
//!   (skipped for deletions)
//! - Normalizes it into a [`CanonicalEventRecord`](core::CanonicalEventRecord)
//! - Publishes the record to an [`EventSink`](notify::EventSink) under a fixed topic
//!
//! A unit that disappears between its notification and the fetch is relayed
//! as a deletion; any other store failure is returned to the caller and
//! nothing is published.
//!
//! ## Quick Start
//!
//! ```rust
//! use config_relay::prelude::*;
//! use config_relay::notify::SubscriberRegistry;
//! use config_relay::sources::MemoryStore;
//! use serde_json::json;
//!
//! # fn example() -> config_relay::error::Result<()> {
//! let store = MemoryStore::new();
//! let bus = SubscriberRegistry::new();
//! let _handle = bus.subscribe("config/*", |topic, record| {
//!     println!("{topic}: {} now has {} properties", record.pid, record.properties.len());
//! });
//!
//! let relay = ChangeRelay::builder()
//!     .with_store(store.clone())
//!     .with_sink(bus)
//!     .build()?;
//!
//! // Every store mutation yields the notification to relay
//! let change = store.update("app.cfg", [("level".to_string(), json!("debug"))].into())?;
//! relay.on_change(&change)?;
//!
//! let change = store.delete("app.cfg")?;
//! relay.on_change(&change)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): [`StoreWatcher`](notify::StoreWatcher) notification
//!   source for [`FileStore`](sources::FileStore) directories
//! - `broadcast` (default): [`BroadcastSink`](notify::BroadcastSink) over a tokio
//!   broadcast channel
//! - `metrics`: OpenTelemetry counters and latency histogram
//! - `tracing`: log relay outcomes with `tracing`; without it the relay does
//!   not log, callers own error reporting

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod settings;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        CanonicalEventRecord, ChangeKind, ChangeRelay, ChangeRelayBuilder,
        ConfigurationChangeEvent, ConfigurationSnapshot, Properties,
    };
    pub use crate::error::{RelayError, Result};
    pub use crate::notify::EventSink;
    pub use crate::settings::RelaySettings;
    pub use crate::sources::ConfigStore;
}
