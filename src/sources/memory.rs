//! In-process configuration store.

use super::ConfigStore;
use crate::core::{ChangeKind, ConfigurationChangeEvent, ConfigurationSnapshot, Properties};
use crate::error::{RelayError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Separator between factory pid and instance name in factory instance pids.
pub const FACTORY_SEPARATOR: char = '~';

#[derive(Debug, Clone, Default)]
struct StoredConfiguration {
    factory_pid: Option<String>,
    location: Option<String>,
    properties: Option<Properties>,
}

type Units = HashMap<String, StoredConfiguration>;

/// In-memory configuration admin.
///
/// Reads are lock-free (`arc-swap`); mutations copy the unit table and swap
/// it in atomically, so a concurrent [`fetch`](ConfigStore::fetch) sees
/// either the old or the new state, never a partial one.
///
/// Every mutation returns the [`ConfigurationChangeEvent`] the store
/// announces for it, ready to be handed to a relay.
///
/// # Examples
///
/// ```rust
/// use config_relay::sources::{ConfigStore, MemoryStore};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// let event = store
///     .update("app.cfg", [("level".to_string(), json!("debug"))].into())
///     .unwrap();
/// assert_eq!(event.pid(), "app.cfg");
///
/// let snapshot = store.fetch("app.cfg").unwrap();
/// assert_eq!(snapshot.properties.unwrap()["level"], json!("debug"));
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    units: Arc<ArcSwap<Units>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a unit without properties, if it does not exist yet.
    ///
    /// No notification is produced; the store announces a unit once it is
    /// given properties.
    pub fn create(&self, pid: &str) -> Result<()> {
        check_pid(pid)?;
        self.mutate(|units| {
            units.entry(pid.to_string()).or_default();
            Ok(())
        })
    }

    /// Replace the properties of `pid`, creating the unit if needed.
    pub fn update(&self, pid: &str, properties: Properties) -> Result<ConfigurationChangeEvent> {
        check_pid(pid)?;
        self.mutate(|units| {
            let unit = units.entry(pid.to_string()).or_default();
            unit.properties = Some(properties);
            let kind = if unit.factory_pid.is_some() {
                ChangeKind::FactoryUpdated
            } else {
                ChangeKind::Updated
            };
            event_for(pid, unit.factory_pid.as_deref(), kind)
        })
    }

    /// Replace the properties of the factory instance `name` of `factory_pid`.
    ///
    /// The instance pid is `<factory_pid>~<name>`.
    pub fn update_factory(
        &self,
        factory_pid: &str,
        name: &str,
        properties: Properties,
    ) -> Result<ConfigurationChangeEvent> {
        check_pid(factory_pid)?;
        check_pid(name)?;
        let pid = format!("{factory_pid}{FACTORY_SEPARATOR}{name}");
        self.mutate(|units| {
            let unit = units.entry(pid.clone()).or_default();
            unit.factory_pid = Some(factory_pid.to_string());
            unit.properties = Some(properties);
            event_for(&pid, Some(factory_pid), ChangeKind::FactoryUpdated)
        })
    }

    /// Bind `pid` to a new owning location, or unbind it with `None`.
    pub fn set_location(
        &self,
        pid: &str,
        location: Option<String>,
    ) -> Result<ConfigurationChangeEvent> {
        self.mutate(|units| {
            let unit = units
                .get_mut(pid)
                .ok_or_else(|| RelayError::not_found(pid))?;
            unit.location = location;
            event_for(pid, unit.factory_pid.as_deref(), ChangeKind::LocationChanged)
        })
    }

    /// Remove `pid` from the store.
    pub fn delete(&self, pid: &str) -> Result<ConfigurationChangeEvent> {
        self.mutate(|units| {
            let unit = units.remove(pid).ok_or_else(|| RelayError::not_found(pid))?;
            event_for(pid, unit.factory_pid.as_deref(), ChangeKind::Deleted)
        })
    }

    /// All pids currently in the store, sorted.
    pub fn pids(&self) -> Vec<String> {
        let mut pids: Vec<_> = self.units.load().keys().cloned().collect();
        pids.sort();
        pids
    }

    /// Number of units in the store.
    pub fn len(&self) -> usize {
        self.units.load().len()
    }

    /// Whether the store holds no units.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `change` to a copy of the unit table and publish it only on success.
    fn mutate<T>(&self, change: impl FnOnce(&mut Units) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock();
        let mut units = Units::clone(&self.units.load());
        let out = change(&mut units)?;
        self.units.store(Arc::new(units));
        Ok(out)
    }
}

impl ConfigStore for MemoryStore {
    fn fetch(&self, pid: &str) -> Result<ConfigurationSnapshot> {
        let units = self.units.load();
        let unit = units.get(pid).ok_or_else(|| RelayError::not_found(pid))?;
        Ok(ConfigurationSnapshot {
            pid: pid.to_string(),
            location: unit.location.clone(),
            properties: unit.properties.clone(),
        })
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}

fn check_pid(pid: &str) -> Result<()> {
    if pid.is_empty() {
        return Err(RelayError::InvalidPid(pid.to_string()));
    }
    Ok(())
}

fn event_for(
    pid: &str,
    factory_pid: Option<&str>,
    kind: ChangeKind,
) -> Result<ConfigurationChangeEvent> {
    let event = ConfigurationChangeEvent::new(pid, kind)?;
    Ok(match factory_pid {
        Some(factory_pid) => event.with_factory_pid(factory_pid),
        None => event,
    })
}
