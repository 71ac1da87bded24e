use crate::types::Coordinate;
use serde::{Deserialize, Serialize};

/// Named aggregate of one user's notes, derived and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Shared location name of the member notes
    pub name: String,

    /// Coordinate of the first member note
    pub representative_coordinate: Coordinate,

    /// Number of notes grouped under this name
    pub member_note_count: usize,
}
