//! Presence & proximity engine.
//!
//! Drives a user's self-expiring visibility session, watches friends for new
//! sessions, and groups the user's notes into distance-ranked places. The
//! document store, notification sink and clock are collaborators injected by
//! the host.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow unwrap/expect in test code for convenience
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod notify;
pub mod places;
pub mod presence;
pub mod store;
pub mod test_utils;
pub mod watcher;

pub use beacon_entity as entity;
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{ConfigError, EngineConfig, NotificationConfig, PlacesConfig, PresenceConfig};
pub use error::{Error, Result};
pub use notify::{LogSink, NotificationSink, NotifyError};
pub use places::{DeleteOutcome, PlaceList, PlaceService, PlacesEvent};
pub use presence::{HiddenReason, PresenceHandle, PresenceSession, SessionEvent, TransitionOutcome};
pub use store::{
    Change, ChangeKind, ChangeStream, Document, DocumentStore, FailureMode, Filter, MemoryStore,
    StoreError,
};
pub use watcher::{FriendWatcher, PresenceDeduper, WatcherEvent, WatcherHandle};
