use std::sync::Arc;

use beacon_engine::entity::{Coordinate, NOTES_COLLECTION};
use beacon_engine::store::object;
use beacon_engine::test_utils::note_document;
use beacon_engine::{
    ChangeKind, DeleteOutcome, DocumentStore, Filter, MemoryStore, PlaceService, PlacesConfig,
    PlacesEvent,
};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::init_tracing;

async fn seed(store: &MemoryStore, owner: &str, notes: &[(&str, &str, f64, f64)]) {
    for (key, name, lat, lon) in notes {
        store.set(NOTES_COLLECTION, key, note_document(owner, name, *lat, *lon), false).await.unwrap();
    }
}

fn names(service: &PlaceService<MemoryStore>) -> Vec<String> {
    service.places().iter().map(|place| place.name.clone()).collect()
}

#[tokio::test]
async fn test_delete_place_cascades_to_owned_notes() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "Park", 0.0, 0.0), ("n2", "Cafe", 1.0, 1.0), ("n3", "Park", 0.0, 0.001)]).await;
    seed(&store, "bob", &[("b1", "Park", 0.0, 0.0)]).await;

    let mut service = PlaceService::new(Arc::new(store.clone()), "alice", &PlacesConfig::default());
    service.set_current_location(Coordinate::new(0.0, 0.0));
    service.refresh().await.unwrap();
    service.load_next_page();
    let mut events = service.subscribe();

    let outcome = service.delete_place("Park").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { notes: 2 });
    assert_eq!(names(&service), vec!["Cafe".to_string()]);
    assert_eq!(service.visible().len(), 1);
    assert_eq!(events.recv().await.unwrap(), PlacesEvent::Removed { name: "Park".to_string() });

    // Bob's note with the same name is untouched
    let remaining = store.query(NOTES_COLLECTION, &Filter::All).await.unwrap();
    let keys: Vec<&str> = remaining.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["n2", "b1"]);
}

#[tokio::test]
async fn test_delete_nonexistent_place_is_noop() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "Park", 0.0, 0.0)]).await;

    let mut service = PlaceService::new(Arc::new(store.clone()), "alice", &PlacesConfig::default());
    service.refresh().await.unwrap();
    let writes = store.writes();

    assert_eq!(service.delete_place("Library").await.unwrap(), DeleteOutcome::NotFound);
    assert_eq!(names(&service), vec!["Park".to_string()]);
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn test_delete_empty_name_keeps_unplaced_notes() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "", 0.0, 0.0), ("n2", "Park", 0.0, 0.0)]).await;

    let mut service = PlaceService::new(Arc::new(store.clone()), "alice", &PlacesConfig::default());
    service.refresh().await.unwrap();
    assert_eq!(names(&service), vec!["Park".to_string()]);

    assert_eq!(service.delete_place("").await.unwrap(), DeleteOutcome::NotFound);
    assert!(store.get(NOTES_COLLECTION, "n1").await.unwrap().is_some());
    assert_eq!(store.len(NOTES_COLLECTION).await, 2);
}

#[tokio::test]
async fn test_note_already_gone_counts_as_deleted() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "Park", 0.0, 0.0), ("n2", "Park", 0.0, 0.0)]).await;

    let mut service = PlaceService::new(Arc::new(store.clone()), "alice", &PlacesConfig::default());
    service.refresh().await.unwrap();
    store.delete(NOTES_COLLECTION, "n2").await.unwrap();

    assert_eq!(service.delete_place("Park").await.unwrap(), DeleteOutcome::Deleted { notes: 2 });
    assert!(store.is_empty(NOTES_COLLECTION).await);
}

#[tokio::test]
async fn test_malformed_notes_are_skipped() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "Park", 0.0, 0.0)]).await;
    store
        .set(NOTES_COLLECTION, "bad1", object(json!({ "user": "alice", "locationName": "Ghost" })), false)
        .await
        .unwrap();
    store
        .set(
            NOTES_COLLECTION,
            "bad2",
            object(json!({ "user": "alice", "text": "", "locationName": "Mars", "location": { "lat": 500.0, "lon": 0.0 } })),
            false,
        )
        .await
        .unwrap();
    seed(&store, "alice", &[("n2", "Cafe", 1.0, 1.0)]).await;

    let mut service = PlaceService::new(Arc::new(store), "alice", &PlacesConfig::default());
    service.refresh().await.unwrap();

    assert_eq!(names(&service), vec!["Park".to_string(), "Cafe".to_string()]);
    assert_eq!(service.notes().len(), 2);
}

#[tokio::test]
async fn test_paging_two_four_five() {
    init_tracing();
    let store = MemoryStore::new();
    seed(
        &store,
        "alice",
        &[
            ("n1", "E", 4.0, 0.0),
            ("n2", "A", 0.0, 0.0),
            ("n3", "C", 2.0, 0.0),
            ("n4", "B", 1.0, 0.0),
            ("n5", "D", 3.0, 0.0),
        ],
    )
    .await;

    let config = PlacesConfig { page_size: 2 };
    let mut service = PlaceService::new(Arc::new(store), "alice", &config);
    service.set_current_location(Coordinate::new(0.0, 0.0));
    service.refresh().await.unwrap();

    assert_eq!(service.load_next_page().len(), 2);
    assert_eq!(service.load_next_page().len(), 4);
    let all: Vec<&str> = service.load_next_page().iter().map(|place| place.name.as_str()).collect();
    assert_eq!(all, vec!["A", "B", "C", "D", "E"]);
    assert!(!service.has_more());

    // Moving re-ranks and restarts paging
    service.set_current_location(Coordinate::new(4.0, 0.0));
    assert_eq!(service.visible().len(), 0);
    assert_eq!(service.load_next_page()[0].name, "E");
}

#[tokio::test]
async fn test_subscription_feeds_service() {
    init_tracing();
    let store = MemoryStore::new();
    seed(&store, "alice", &[("n1", "Park", 0.0, 0.0)]).await;

    let mut service = PlaceService::new(Arc::new(store.clone()), "alice", &PlacesConfig::default());
    let mut changes = service.subscribe_notes().await.unwrap();

    let snapshot = changes.next().await.unwrap().unwrap();
    assert!(service.apply_change(&snapshot));

    seed(&store, "alice", &[("n2", "Cafe", 1.0, 1.0)]).await;
    seed(&store, "bob", &[("b1", "Gym", 1.0, 1.0)]).await;
    store.delete(NOTES_COLLECTION, "n1").await.unwrap();

    let added = changes.next().await.unwrap().unwrap();
    assert_eq!(added.key, "n2");
    assert!(service.apply_change(&added));

    let removed = changes.next().await.unwrap().unwrap();
    assert_eq!(removed.kind, ChangeKind::Removed);
    assert!(service.apply_change(&removed));

    assert_eq!(names(&service), vec!["Cafe".to_string()]);
}
