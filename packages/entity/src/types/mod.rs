mod coordinate;
mod friend_link;
mod note;
mod note_document;
mod place;
mod presence_document;
mod presence_event;
mod user_presence;

pub use coordinate::{Coordinate, CoordinateError};
pub use friend_link::{FriendLink, FriendListDocument};
pub use note::Note;
pub use note_document::NoteDocument;
pub use place::Place;
pub use presence_document::PresenceDocument;
pub use presence_event::PresenceEvent;
pub use user_presence::{UserKey, UserPresence};

/// Wall-clock instant used for presence sessions and dedup.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Store collection holding one presence document per user.
pub const PRESENCE_COLLECTION: &str = "presence";

/// Store collection holding one document per note.
pub const NOTES_COLLECTION: &str = "notes";

/// Store collection holding one friend list document per owner.
pub const FRIENDS_COLLECTION: &str = "friends";
