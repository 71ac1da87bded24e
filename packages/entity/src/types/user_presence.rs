use crate::types::{Coordinate, Timestamp};
use serde::{Deserialize, Serialize};

/// Opaque user identifier as used by the document store
pub type UserKey = String;

/// Local view of one user's visibility session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPresence {
    /// Owning user
    pub user: UserKey,

    /// Whether the user is currently sharing location
    pub visible: bool,

    /// Last published location, only present while visible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_location: Option<Coordinate>,

    /// Start of the current visibility session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_enabled_at: Option<Timestamp>,
}

impl UserPresence {
    /// Initial hidden presence for a user
    pub fn hidden(user: impl Into<UserKey>) -> Self {
        Self {
            user: user.into(),
            visible: false,
            last_location: None,
            visibility_enabled_at: None,
        }
    }

    /// Enter a visibility session started at `now`.
    pub fn enter_visible(&mut self, now: Timestamp, location: Option<Coordinate>) {
        self.visible = true;
        self.visibility_enabled_at = Some(now);
        self.last_location = location;
    }

    /// Leave the visibility session, dropping the published location.
    pub fn enter_hidden(&mut self) {
        self.visible = false;
        self.last_location = None;
        self.visibility_enabled_at = None;
    }

    /// Record a newly published location. Ignored while hidden.
    pub fn publish_location(&mut self, location: Coordinate) -> bool {
        if !self.visible {
            return false;
        }
        self.last_location = Some(location);
        true
    }
}
