//! Directory-backed configuration store.

use super::ConfigStore;
use super::memory::FACTORY_SEPARATOR;
use crate::core::{ConfigurationSnapshot, Properties};
use crate::error::{RelayError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File extensions recognized as configuration units, in lookup order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Directory-backed configuration store.
///
/// Each file `<pid>.<ext>` in the directory is one configuration unit, parsed
/// as YAML, TOML or JSON based on its extension. A file stem containing `~`
/// is a factory instance: `worker~east.yaml` has pid `worker~east` and factory
/// pid `worker`.
///
/// # Examples
///
/// ```rust,no_run
/// use config_relay::sources::{ConfigStore, FileStore};
///
/// let store = FileStore::new("/etc/myapp/conf.d");
/// let snapshot = store.fetch("database").unwrap();
/// println!("{:?}", snapshot.location);
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find the file backing `pid`, if any.
    pub fn resolve(&self, pid: &str) -> Option<PathBuf> {
        if pid.is_empty() || pid.contains(['/', '\\']) {
            return None;
        }
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{pid}.{ext}")))
            .find(|path| path.is_file())
    }

    /// The pid a file path stands for, or `None` if it is not a configuration file.
    pub fn pid_for_path(path: &Path) -> Option<String> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if !SUPPORTED_EXTENSIONS.contains(&extension) {
            return None;
        }
        let stem = path.file_stem().and_then(|stem| stem.to_str())?;
        if stem.is_empty() || stem.starts_with('.') {
            return None;
        }
        Some(stem.to_string())
    }

    /// The factory pid encoded in `pid`, if it names a factory instance.
    pub fn factory_pid_of(pid: &str) -> Option<&str> {
        pid.split_once(FACTORY_SEPARATOR)
            .map(|(factory, _)| factory)
            .filter(|factory| !factory.is_empty())
    }

    fn load_properties(pid: &str, path: &Path) -> Result<Properties> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            // Removed after `resolve` found it
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RelayError::not_found(pid));
            }
            Err(e) => {
                return Err(RelayError::StoreError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        Self::parse_properties(path, &content)
    }

    fn parse_properties(path: &Path, content: &str) -> Result<Properties> {
        if content.trim().is_empty() {
            return Ok(Properties::new());
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let parsed = match extension {
            "yaml" | "yml" => serde_yaml::from_str::<Properties>(content).map_err(|e| e.to_string()),
            "toml" => toml::from_str::<Properties>(content).map_err(|e| e.to_string()),
            "json" => serde_json::from_str::<Properties>(content).map_err(|e| e.to_string()),
            other => Err(format!("unsupported extension '{}'", other)),
        };

        parsed.map_err(|e| RelayError::StoreError(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

impl ConfigStore for FileStore {
    fn fetch(&self, pid: &str) -> Result<ConfigurationSnapshot> {
        let path = self.resolve(pid).ok_or_else(|| RelayError::not_found(pid))?;
        let properties = Self::load_properties(pid, &path)?;

        let absolute = path.canonicalize().unwrap_or(path);
        Ok(ConfigurationSnapshot::new(pid, Some(properties))
            .with_location(format!("file:{}", absolute.display())))
    }

    fn name(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}
