use std::collections::HashMap;

use beacon_entity::{PresenceEvent, Timestamp, UserKey};

/// Remembers the last session start actioned per friend.
///
/// Stores deliver a document again on every field change, so the same
/// `locationEnabledAt` shows up many times per session.
#[derive(Debug, Default)]
pub struct PresenceDeduper {
    last_notified: HashMap<UserKey, Timestamp>,
}

impl PresenceDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event if it starts a session newer than any seen for the friend.
    pub fn observe(&mut self, event: PresenceEvent) -> Option<PresenceEvent> {
        match self.last_notified.get(&event.friend) {
            Some(last) if event.enabled_at <= *last => None,
            _ => {
                self.last_notified.insert(event.friend.clone(), event.enabled_at);
                Some(event)
            },
        }
    }

    pub fn last_notified(&self, friend: &str) -> Option<Timestamp> {
        self.last_notified.get(friend).copied()
    }
}
