//! Configuration store implementations.

mod config_store;
mod file;
mod memory;

pub use config_store::ConfigStore;
pub use file::{FileStore, SUPPORTED_EXTENSIONS};
pub use memory::{FACTORY_SEPARATOR, MemoryStore};
