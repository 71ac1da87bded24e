use crate::types::{Timestamp, UserKey};
use serde::{Deserialize, Serialize};

/// A friend started a new visibility session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Friend whose presence changed
    pub friend: UserKey,

    /// Start of the friend's visibility session
    pub enabled_at: Timestamp,
}

impl PresenceEvent {
    pub fn new(friend: impl Into<UserKey>, enabled_at: Timestamp) -> Self {
        Self { friend: friend.into(), enabled_at }
    }
}
