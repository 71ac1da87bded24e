//! Groups a user's notes into named places and pages through them by proximity.

mod service;

pub use service::PlaceService;

use std::cmp::Ordering;
use std::collections::HashMap;

use beacon_entity::{Coordinate, Note, Place};

use crate::geo::distance;

/// Result of cascading a place deletion over its notes
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// Every note with the name was deleted
    Deleted { notes: usize },
    /// Some note deletions failed; the place may reappear on the next refresh
    Partial { deleted: usize, failed: Vec<(String, String)> },
    /// No place with that name exists
    NotFound,
}

impl DeleteOutcome {
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Partial { .. })
    }
}

/// Changes to the place list, for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum PlacesEvent {
    /// The list was recomputed; paging restarts from the first page
    Reloaded { places: usize },
    /// A page was exposed
    PageLoaded { visible: usize, total: usize },
    /// A place was removed locally
    Removed { name: String },
}

/// Group notes by non-empty `location_name`.
///
/// The first note seen for a name supplies the representative coordinate.
/// With a current location the places are ranked nearest first, ties keeping
/// first-seen order; without one first-seen order is kept.
pub fn aggregate(notes: &[Note], current: Option<Coordinate>) -> Vec<Place> {
    let mut places: Vec<Place> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for note in notes.iter().filter(|note| note.has_place()) {
        match by_name.get(note.location_name.as_str()) {
            Some(&index) => places[index].member_note_count += 1,
            None => {
                by_name.insert(note.location_name.as_str(), places.len());
                places.push(Place {
                    name: note.location_name.clone(),
                    representative_coordinate: note.coordinate,
                    member_note_count: 1,
                });
            },
        }
    }

    if let Some(current) = current {
        rank_by_distance(&mut places, current);
    }
    places
}

fn rank_by_distance(places: &mut [Place], current: Coordinate) {
    // sort_by is stable
    places.sort_by(|a, b| {
        distance(current, a.representative_coordinate)
            .partial_cmp(&distance(current, b.representative_coordinate))
            .unwrap_or(Ordering::Equal)
    });
}

/// Ranked places with a paging cursor over them
#[derive(Debug, Clone)]
pub struct PlaceList {
    places: Vec<Place>,
    exposed: usize,
    page_size: usize,
}

impl PlaceList {
    pub fn new(page_size: usize) -> Self {
        Self { places: Vec::new(), exposed: 0, page_size: page_size.max(1) }
    }

    pub fn from_notes(notes: &[Note], current: Option<Coordinate>, page_size: usize) -> Self {
        let mut list = Self::new(page_size);
        list.replace(notes, current);
        list
    }

    /// Recompute from `notes` and restart paging
    pub fn replace(&mut self, notes: &[Note], current: Option<Coordinate>) {
        self.places = aggregate(notes, current);
        self.exposed = 0;
    }

    /// Expose one more page and return everything exposed so far.
    ///
    /// The ranking is not recomputed.
    pub fn load_next_page(&mut self) -> &[Place] {
        self.exposed = (self.exposed + self.page_size).min(self.places.len());
        self.visible()
    }

    pub fn visible(&self) -> &[Place] {
        &self.places[..self.exposed]
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn has_more(&self) -> bool {
        self.exposed < self.places.len()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Place> {
        self.places.iter().find(|place| place.name == name)
    }

    /// Remove the place named `name`, keeping the cursor on the same places.
    pub fn remove(&mut self, name: &str) -> Option<Place> {
        let index = self.places.iter().position(|place| place.name == name)?;
        if index < self.exposed {
            self.exposed -= 1;
        }
        Some(self.places.remove(index))
    }
}
