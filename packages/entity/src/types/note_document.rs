use crate::types::{Coordinate, CoordinateError, Note};
use serde::{Deserialize, Serialize};

/// Note as stored in the `notes` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    /// Authoring user key
    pub user: String,

    pub text: String,

    pub location_name: String,

    pub location: Coordinate,

    #[serde(rename = "imageURL", default)]
    pub image_url: String,
}

impl NoteDocument {
    /// Convert into a note, validating the stored coordinate.
    pub fn into_note(self, id: impl Into<String>) -> Result<Note, CoordinateError> {
        Ok(Note {
            id: id.into(),
            owner: self.user,
            text: self.text,
            coordinate: self.location.validated()?,
            location_name: self.location_name,
            image_ref: self.image_url,
        })
    }
}

impl From<&Note> for NoteDocument {
    fn from(note: &Note) -> Self {
        Self {
            user: note.owner.clone(),
            text: note.text.clone(),
            location_name: note.location_name.clone(),
            location: note.coordinate,
            image_url: note.image_ref.clone(),
        }
    }
}
