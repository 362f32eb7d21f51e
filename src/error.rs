//! Error types for config-relay.

/// Result type alias for config-relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying configuration changes.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No configuration unit exists with the given pid.
    ///
    /// The relay treats this as a race between a delete and its fetch and
    /// publishes a degraded record instead of failing.
    #[error("Configuration not found: {pid}")]
    NotFound {
        /// The pid that was looked up
        pid: String,
    },

    /// The configuration store failed to answer a query.
    #[error("Configuration store error: {0}")]
    StoreError(String),

    /// The output sink rejected a record after it was built.
    #[error("Failed to publish to '{topic}': {reason}")]
    SinkError {
        /// Topic the record was published under
        topic: String,
        /// Why the sink failed
        reason: String,
    },

    /// A configuration identifier was empty or malformed.
    #[error("Invalid configuration pid: {0:?}")]
    InvalidPid(String),

    /// A relay was assembled without a required collaborator.
    #[error("Failed to build relay: {0}")]
    BuildError(String),

    /// Relay settings could not be loaded or are invalid.
    #[error("Invalid relay settings: {0}")]
    SettingsError(String),

    /// Watching the store for changes failed.
    #[error("Watch error: {0}")]
    WatchError(String),
}

impl RelayError {
    /// Create a not-found error for `pid`.
    pub fn not_found(pid: impl Into<String>) -> Self {
        Self::NotFound { pid: pid.into() }
    }

    /// Create a sink error for `topic`.
    pub fn sink(topic: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SinkError {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error reports a missing configuration unit.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
