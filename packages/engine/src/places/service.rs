use std::sync::Arc;

use beacon_entity::{Coordinate, NOTES_COLLECTION, Note, NoteDocument, Place, UserKey};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeleteOutcome, PlaceList, PlacesEvent};
use crate::config::PlacesConfig;
use crate::error::{Error, Result};
use crate::store::{
    Change, ChangeKind, ChangeStream, Document, DocumentStore, Filter, StoreError, from_document,
    to_document,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One user's notes and the places derived from them.
///
/// Mutations take `&mut self`, so the owner of the service is the single
/// writer of its place list.
pub struct PlaceService<S: DocumentStore> {
    store: Arc<S>,
    owner: UserKey,
    notes: Vec<Note>,
    current: Option<Coordinate>,
    list: PlaceList,
    events: broadcast::Sender<PlacesEvent>,
}

impl<S: DocumentStore> PlaceService<S> {
    pub fn new(store: Arc<S>, owner: impl Into<UserKey>, config: &PlacesConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            owner: owner.into(),
            notes: Vec::new(),
            current: None,
            list: PlaceList::new(config.page_size),
            events,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlacesEvent> {
        self.events.subscribe()
    }

    fn owner_filter(&self) -> Filter {
        Filter::field_equals("user", self.owner.as_str())
    }

    fn parse_note(key: &str, document: &Document) -> Result<Note> {
        let parsed: NoteDocument = from_document(NOTES_COLLECTION, key, document)?;
        parsed.into_note(key).map_err(|e| Error::malformed(NOTES_COLLECTION, key, e))
    }

    fn recompute(&mut self) {
        self.list.replace(&self.notes, self.current);
        self.emit(PlacesEvent::Reloaded { places: self.list.len() });
    }

    fn emit(&self, event: PlacesEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Reload every note owned by the user and rebuild the place list.
    ///
    /// Malformed documents are skipped.
    pub async fn refresh(&mut self) -> Result<&[Place]> {
        let documents = self.store.query(NOTES_COLLECTION, &self.owner_filter()).await?;

        let mut notes = Vec::with_capacity(documents.len());
        for (key, document) in documents {
            match Self::parse_note(&key, &document) {
                Ok(note) => notes.push(note),
                Err(e) => warn!(owner = %self.owner, key, error = %e, "skipping malformed note"),
            }
        }

        debug!(owner = %self.owner, notes = notes.len(), "notes refreshed");
        self.notes = notes;
        self.recompute();
        Ok(self.list.places())
    }

    /// Change stream over the user's notes, snapshot first
    pub async fn subscribe_notes(&self) -> Result<ChangeStream> {
        Ok(self.store.subscribe(NOTES_COLLECTION, self.owner_filter()).await?)
    }

    /// Apply one change from [`subscribe_notes`](Self::subscribe_notes).
    ///
    /// Returns whether the note set changed. Upserts are idempotent.
    pub fn apply_change(&mut self, change: &Change) -> bool {
        let changed = match change.kind {
            ChangeKind::Upserted => match Self::parse_note(&change.key, &change.document) {
                Ok(note) if note.owner == self.owner => self.upsert(note),
                Ok(_) => self.remove_note(&change.key),
                Err(e) => {
                    warn!(owner = %self.owner, key = %change.key, error = %e, "skipping malformed note");
                    false
                },
            },
            ChangeKind::Removed => self.remove_note(&change.key),
        };

        if changed {
            self.recompute();
        }
        changed
    }

    fn upsert(&mut self, note: Note) -> bool {
        match self.notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) if *existing == note => false,
            Some(existing) => {
                *existing = note;
                true
            },
            None => {
                self.notes.push(note);
                true
            },
        }
    }

    fn remove_note(&mut self, id: &str) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        self.notes.len() != before
    }

    /// Write a new note for the user and fold it into the place list.
    pub async fn record_note(
        &mut self,
        text: impl Into<String>,
        coordinate: Coordinate,
        location_name: impl Into<String>,
        image_ref: impl Into<String>,
    ) -> Result<Note> {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            owner: self.owner.clone(),
            text: text.into(),
            coordinate: coordinate
                .validated()
                .map_err(|e| Error::malformed(NOTES_COLLECTION, "new", e))?,
            location_name: location_name.into(),
            image_ref: image_ref.into(),
        };

        let fields = to_document(NOTES_COLLECTION, &note.id, &NoteDocument::from(&note))?;
        self.store.set(NOTES_COLLECTION, &note.id, fields, false).await?;

        info!(owner = %self.owner, id = %note.id, place = %note.location_name, "note recorded");
        self.upsert(note.clone());
        self.recompute();
        Ok(note)
    }

    /// Delete every note of the user named `name`.
    ///
    /// The place leaves the local list right away; notes the store failed to
    /// delete are reported in [`DeleteOutcome::Partial`].
    pub async fn delete_place(&mut self, name: &str) -> Result<DeleteOutcome> {
        // Notes without a location name never form a place
        if name.is_empty() {
            debug!(owner = %self.owner, "no such place");
            return Ok(DeleteOutcome::NotFound);
        }

        let mut ids: Vec<String> = match self.store.query(NOTES_COLLECTION, &self.owner_filter()).await {
            Ok(documents) => documents
                .into_iter()
                .filter(|(_, document)| {
                    document.get("locationName").and_then(|v| v.as_str()) == Some(name)
                })
                .map(|(key, _)| key)
                .collect(),
            Err(e) if e.is_transient() => {
                warn!(owner = %self.owner, place = name, error = %e, "falling back to local notes for delete");
                Vec::new()
            },
            Err(e) => return Err(e.into()),
        };

        for note in self.notes.iter().filter(|note| note.location_name == name) {
            if !ids.contains(&note.id) {
                ids.push(note.id.clone());
            }
        }

        if ids.is_empty() && self.list.get(name).is_none() {
            debug!(owner = %self.owner, place = name, "no such place");
            return Ok(DeleteOutcome::NotFound);
        }

        self.notes.retain(|note| note.location_name != name);
        if self.list.remove(name).is_some() {
            self.emit(PlacesEvent::Removed { name: name.to_string() });
        }

        let mut deleted = 0;
        let mut failed = Vec::new();
        for id in ids {
            match self.store.delete(NOTES_COLLECTION, &id).await {
                Ok(()) | Err(StoreError::NotFound { .. }) => deleted += 1,
                Err(e) => {
                    warn!(owner = %self.owner, place = name, id, error = %e, "note delete failed");
                    failed.push((id, e.to_string()));
                },
            }
        }

        info!(owner = %self.owner, place = name, deleted, failed = failed.len(), "place deleted");
        if failed.is_empty() {
            Ok(DeleteOutcome::Deleted { notes: deleted })
        } else {
            Ok(DeleteOutcome::Partial { deleted, failed })
        }
    }

    /// Image of the first note in the place that has one
    pub fn thumbnail_for(&self, name: &str) -> Option<String> {
        self.notes
            .iter()
            .filter(|note| note.location_name == name)
            .find(|note| !note.image_ref.is_empty())
            .map(|note| note.image_ref.clone())
    }

    /// Re-rank places around `coordinate` and restart paging
    pub fn set_current_location(&mut self, coordinate: Coordinate) {
        self.current = Some(coordinate);
        self.recompute();
    }

    pub fn current_location(&self) -> Option<Coordinate> {
        self.current
    }

    pub fn load_next_page(&mut self) -> &[Place] {
        let total = self.list.len();
        let visible = self.list.load_next_page().len();
        self.emit(PlacesEvent::PageLoaded { visible, total });
        self.list.visible()
    }

    pub fn visible(&self) -> &[Place] {
        self.list.visible()
    }

    pub fn places(&self) -> &[Place] {
        self.list.places()
    }

    pub fn has_more(&self) -> bool {
        self.list.has_more()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}
