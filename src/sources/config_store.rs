//! Configuration store trait.

use crate::core::ConfigurationSnapshot;
use crate::error::Result;
use std::sync::Arc;

/// Trait for configuration stores queried by the relay.
///
/// Implement this trait to adapt an external configuration service (a
/// key-value store, a configuration admin, a directory of files) to the relay.
///
/// Implementations must be safe to call from many threads at once, since
/// notifications may be relayed concurrently.
pub trait ConfigStore: Send + Sync {
    /// Fetch the current state of the unit identified by `pid`.
    ///
    /// The returned snapshot owns its properties; mutating it never affects
    /// the store.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotFound`](crate::error::RelayError::NotFound) if no unit
    ///   with that pid exists
    /// - [`RelayError::StoreError`](crate::error::RelayError::StoreError) for any
    ///   underlying failure (I/O, permissions, parsing)
    fn fetch(&self, pid: &str) -> Result<ConfigurationSnapshot>;

    /// Get a human-readable name for this store (for logging/debugging).
    fn name(&self) -> String;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn fetch(&self, pid: &str) -> Result<ConfigurationSnapshot> {
        (**self).fetch(pid)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
