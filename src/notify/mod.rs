//! Output sinks and notification sources around the relay.
//!
//! Sinks receive canonical records from the relay; the file watcher feeds the
//! relay with change notifications for a [`FileStore`](crate::sources::FileStore).

mod sink;
pub mod subscriber;

#[cfg(feature = "broadcast")]
pub mod broadcast;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use sink::{EventSink, JsonWriterSink};
pub use subscriber::{SubscriberRegistry, SubscriptionHandle, topic_matches};

#[cfg(feature = "broadcast")]
pub use broadcast::BroadcastSink;

#[cfg(feature = "file-watch")]
pub use watcher::StoreWatcher;
