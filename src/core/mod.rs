//! Core relay types.

mod builder;
mod event;
mod relay;

pub use builder::ChangeRelayBuilder;
pub use event::{
    CanonicalEventRecord, ChangeKind, ConfigurationChangeEvent, ConfigurationSnapshot, Properties,
    PublishedEvent,
};
pub use relay::ChangeRelay;
