//! Example relaying a watched configuration directory to stdout.
//!
//! This example shows how to:
//! - Load relay settings from the environment
//! - Watch a directory of configuration files
//! - Stream every change as a line of JSON
//!
//! Run with: cargo run --example watch_directory -- /path/to/conf.d
//! Then create, edit or delete `*.yaml`, `*.toml` or `*.json` files there.

use config_relay::notify::{JsonWriterSink, StoreWatcher};
use config_relay::prelude::*;
use config_relay::sources::FileStore;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // RELAY_TOPIC, RELAY_DEBOUNCE_MS, RELAY_STORE_DIR
    let settings = RelaySettings::load(None, "RELAY")?;

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.store_dir.clone())
        .ok_or_else(|| RelayError::SettingsError("usage: watch_directory <dir>".to_string()))?;

    let store = FileStore::new(&dir);
    let (_watcher, notifications) = StoreWatcher::new(&store, settings.debounce())?;

    let relay = ChangeRelay::builder()
        .with_store(store)
        .with_sink(JsonWriterSink::new(std::io::stdout()))
        .with_settings(&settings)
        .build()?;

    eprintln!("Relaying changes in {} under '{}'", dir.display(), relay.topic());

    relay
        .run(notifications, |change, err| {
            eprintln!("Failed to relay {} ({}): {}", change.pid(), change.kind(), err);
        })
        .await;

    Ok(())
}
