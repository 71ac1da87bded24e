use crate::types::{Coordinate, UserKey};
use serde::{Deserialize, Serialize};

/// Geotagged note authored by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Store key of the note
    pub id: String,

    /// Authoring user
    pub owner: UserKey,

    /// Free-form note text
    pub text: String,

    /// Where the note was taken
    pub coordinate: Coordinate,

    /// Human-readable place name, the grouping key for places
    pub location_name: String,

    /// Reference to the attached image, empty when none
    pub image_ref: String,
}

impl Note {
    /// Whether the note participates in place aggregation.
    pub fn has_place(&self) -> bool {
        !self.location_name.is_empty()
    }
}
