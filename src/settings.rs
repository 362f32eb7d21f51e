//! Relay settings with layered loading.

use crate::error::{RelayError, Result};
use config::{Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Topic records are published under unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "config/changes";

/// Settings for assembling a relay.
///
/// Loaded with standard precedence: built-in defaults, then an optional
/// settings file (YAML, TOML or JSON), then environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use config_relay::settings::RelaySettings;
///
/// // RELAY_TOPIC=web/config RELAY_DEBOUNCE_MS=100
/// let settings = RelaySettings::load(Some("relay.yaml".as_ref()), "RELAY").unwrap();
/// println!("publishing under {}", settings.topic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Topic every record is published under
    pub topic: String,
    /// Directory backing a `FileStore`, if one is used
    pub store_dir: Option<PathBuf>,
    /// Debounce window of the store watcher, in milliseconds
    pub debounce_ms: u64,
    /// Capacity of the broadcast sink
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            store_dir: None,
            debounce_ms: 250,
            channel_capacity: 256,
        }
    }
}

impl RelaySettings {
    /// Load settings from `file` (if given) and `<env_prefix>_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SettingsError`] if the file cannot be read or
    /// parsed, a value has the wrong type, or validation fails.
    pub fn load(file: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(env_prefix).try_parsing(true));

        let settings: RelaySettings = builder
            .build()
            .map_err(|e| RelayError::SettingsError(format!("Failed to load settings: {}", e)))?
            .try_deserialize()
            .map_err(|e| RelayError::SettingsError(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values the relay cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(RelayError::SettingsError("topic must not be empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(RelayError::SettingsError(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The watcher debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
