use crate::types::{Coordinate, Timestamp};
use serde::{Deserialize, Serialize};

/// Presence as stored in the `presence` collection, keyed by user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDocument {
    /// Whether the user is sharing location right now
    #[serde(default)]
    pub visibility: bool,

    /// Last broadcast location, absent while hidden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,

    /// Start of the most recent visibility session; kept after hiding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_enabled_at: Option<Timestamp>,
}
