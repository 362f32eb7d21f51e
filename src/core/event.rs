//! Change notifications, store snapshots and the canonical record published downstream.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Property map of a configuration unit.
pub type Properties = HashMap<String, serde_json::Value>;

/// Kind of mutation reported by the configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Properties of a configuration unit were created or updated
    Updated,
    /// The configuration unit was removed
    Deleted,
    /// An instance of a factory configuration was created or updated
    FactoryUpdated,
    /// The owning location of a configuration unit changed
    LocationChanged,
}

impl ChangeKind {
    /// Whether the unit no longer exists after this change.
    pub fn is_deletion(self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Stable lowercase name, as used on the wire and in metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
            ChangeKind::FactoryUpdated => "factory_updated",
            ChangeKind::LocationChanged => "location_changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw change notification delivered by the configuration store.
///
/// Immutable once constructed; the pid is guaranteed to be non-empty.
///
/// # Examples
///
/// ```rust
/// use config_relay::core::{ChangeKind, ConfigurationChangeEvent};
///
/// let event = ConfigurationChangeEvent::new("app.cfg", ChangeKind::Updated).unwrap();
/// assert_eq!(event.pid(), "app.cfg");
/// assert!(event.factory_pid().is_none());
///
/// assert!(ConfigurationChangeEvent::new("", ChangeKind::Deleted).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChangeEvent {
    pid: String,
    factory_pid: Option<String>,
    kind: ChangeKind,
}

impl ConfigurationChangeEvent {
    /// Create a notification for a plain (non-factory) configuration unit.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidPid`] if `pid` is empty.
    pub fn new(pid: impl Into<String>, kind: ChangeKind) -> Result<Self> {
        let pid = pid.into();
        if pid.is_empty() {
            return Err(RelayError::InvalidPid(pid));
        }
        Ok(Self {
            pid,
            factory_pid: None,
            kind,
        })
    }

    /// Attach the factory pid the unit was instantiated from.
    pub fn with_factory_pid(mut self, factory_pid: impl Into<String>) -> Self {
        self.factory_pid = Some(factory_pid.into());
        self
    }

    /// The persistent identifier of the changed unit.
    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// The factory pid, when the unit is a factory instance.
    pub fn factory_pid(&self) -> Option<&str> {
        self.factory_pid.as_deref()
    }

    /// What happened to the unit.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// Live state of a configuration unit at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSnapshot {
    /// The unit's pid
    pub pid: String,
    /// Owning origin, if the store binds units to one
    pub location: Option<String>,
    /// Properties, or `None` for a unit that was created but never updated
    pub properties: Option<Properties>,
}

impl ConfigurationSnapshot {
    /// Create a snapshot without location.
    pub fn new(pid: impl Into<String>, properties: Option<Properties>) -> Self {
        Self {
            pid: pid.into(),
            location: None,
            properties,
        }
    }

    /// Set the owning location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Normalized, publish-ready representation of a configuration change.
///
/// Serializes with camelCase keys. `properties` is always present on the
/// wire, absent optionals are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEventRecord {
    /// pid of the changed unit
    pub pid: String,
    /// Factory pid, for factory instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_pid: Option<String>,
    /// Owning origin, present only when a snapshot was fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Current properties, empty for deletions
    #[serde(default)]
    pub properties: Properties,
}

impl CanonicalEventRecord {
    /// The record published for a unit that no longer exists.
    pub fn deleted(event: &ConfigurationChangeEvent) -> Self {
        Self {
            pid: event.pid.clone(),
            factory_pid: event.factory_pid.clone(),
            location: None,
            properties: Properties::new(),
        }
    }

    /// The record published for a unit whose current state was fetched.
    pub fn from_snapshot(event: &ConfigurationChangeEvent, snapshot: ConfigurationSnapshot) -> Self {
        Self {
            pid: event.pid.clone(),
            factory_pid: event.factory_pid.clone(),
            location: snapshot.location,
            properties: snapshot.properties.unwrap_or_default(),
        }
    }
}

/// A record together with the topic it was published under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    /// Topic the record was published under
    pub topic: String,
    /// The published record
    pub record: CanonicalEventRecord,
}
