use std::sync::Arc;
use std::time::Duration;

use beacon_engine::entity::{FRIENDS_COLLECTION, PRESENCE_COLLECTION, PresenceEvent};
use beacon_engine::store::object;
use beacon_engine::test_utils::RecordingSink;
use beacon_engine::{
    DocumentStore, Error, FailureMode, FriendWatcher, MemoryStore, NotificationConfig, NotifyError,
    PresenceConfig, PresenceSession, TokioClock, WatcherEvent,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

use crate::common::{FlakyStore, init_tracing};

async fn next_event(events: &mut broadcast::Receiver<WatcherEvent>) -> WatcherEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("watcher event within timeout")
        .expect("watcher channel open")
}

async fn befriend(store: &MemoryStore, owner: &str, friends: &[&str]) {
    store.set(FRIENDS_COLLECTION, owner, object(json!({ "friends": friends })), false).await.unwrap();
}

#[tokio::test]
async fn test_friend_session_notifies_once_per_start() {
    init_tracing();
    let store = MemoryStore::new();
    befriend(&store, "alice", &["bob"]).await;
    let sink = Arc::new(RecordingSink::new());

    let mut watcher =
        FriendWatcher::start(Arc::new(store.clone()), sink.clone(), "alice", NotificationConfig::default())
            .await
            .unwrap();
    let mut events = watcher.subscribe();

    // Bob runs a real presence session against the same store
    let bob = PresenceSession::spawn(Arc::new(store.clone()), Arc::new(TokioClock::new()), "bob", PresenceConfig::default());
    bob.update_location(beacon_engine::entity::Coordinate::new(1.0, 1.0)).await.unwrap();
    let first = bob.enable().await.unwrap().presence.visibility_enabled_at.unwrap();

    assert_eq!(next_event(&mut events).await, WatcherEvent::FriendWentLive(PresenceEvent::new("bob", first)));

    // Going hidden keeps locationEnabledAt, so no new event
    bob.disable().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = bob.enable().await.unwrap().presence.visibility_enabled_at.unwrap();
    assert!(second > first);

    assert_eq!(next_event(&mut events).await, WatcherEvent::FriendWentLive(PresenceEvent::new("bob", second)));
    assert_eq!(sink.count().await, 2);

    bob.shutdown().await;
    watcher.stop();
}

#[tokio::test]
async fn test_friend_seen_once_their_store_recovers() {
    init_tracing();
    let store = MemoryStore::new();
    befriend(&store, "alice", &["bob"]).await;
    let sink = Arc::new(RecordingSink::new());

    let mut watcher =
        FriendWatcher::start(Arc::new(store.clone()), sink.clone(), "alice", NotificationConfig::default())
            .await
            .unwrap();
    let mut events = watcher.subscribe();

    // Bob goes live while the store rejects writes
    store.set_write_failure(Some(FailureMode::Unavailable)).await;
    let config = PresenceConfig { broadcast_interval_secs: 1, ..PresenceConfig::default() };
    let bob = PresenceSession::spawn(Arc::new(store.clone()), Arc::new(TokioClock::new()), "bob", config);
    let outcome = bob.enable().await.unwrap();
    assert!(outcome.write_error.is_some());
    let enabled_at = outcome.presence.visibility_enabled_at.unwrap();

    store.set_write_failure(None).await;
    assert_eq!(next_event(&mut events).await, WatcherEvent::FriendWentLive(PresenceEvent::new("bob", enabled_at)));
    assert_eq!(sink.count().await, 1);

    bob.shutdown().await;
    watcher.stop();
}

#[tokio::test]
async fn test_failed_friend_does_not_stop_others() {
    init_tracing();
    let inner = MemoryStore::new();
    befriend(&inner, "alice", &["bob", "carol"]).await;
    let store = FlakyStore::new(inner.clone(), &["bob"]);

    let mut watcher =
        FriendWatcher::start(store, Arc::new(RecordingSink::new()), "alice", NotificationConfig::default())
            .await
            .unwrap();
    let mut events = watcher.subscribe();

    let failed = next_event(&mut events).await;
    assert!(matches!(failed, WatcherEvent::SubscriptionFailed { ref friend, .. } if friend == "bob"));

    let enabled_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    inner
        .set(PRESENCE_COLLECTION, "carol", object(json!({ "visibility": true, "locationEnabledAt": enabled_at })), true)
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        WatcherEvent::FriendWentLive(PresenceEvent::new("carol", enabled_at))
    );
}

#[tokio::test]
async fn test_friend_list_failure_is_returned() {
    init_tracing();
    let store = MemoryStore::new();
    store.set_read_failure(Some(FailureMode::Unavailable)).await;

    let result =
        FriendWatcher::start(Arc::new(store), Arc::new(RecordingSink::new()), "alice", NotificationConfig::default())
            .await;
    assert!(matches!(result, Err(Error::Store(_))));
}

#[tokio::test]
async fn test_sink_failure_still_emits_event() {
    init_tracing();
    let store = MemoryStore::new();
    befriend(&store, "alice", &["bob", "alice", ""]).await;
    let sink = Arc::new(RecordingSink::new());
    sink.fail_with(Some(NotifyError::Rejected("notifications disabled".to_string()))).await;

    let mut watcher =
        FriendWatcher::start(Arc::new(store.clone()), sink.clone(), "alice", NotificationConfig::default())
            .await
            .unwrap();
    assert_eq!(watcher.friends().to_vec(), vec!["bob".to_string()]);
    let mut events = watcher.subscribe();

    let enabled_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store
        .set(PRESENCE_COLLECTION, "bob", object(json!({ "visibility": true, "locationEnabledAt": enabled_at })), true)
        .await
        .unwrap();

    assert_eq!(next_event(&mut events).await, WatcherEvent::FriendWentLive(PresenceEvent::new("bob", enabled_at)));
    assert_eq!(sink.count().await, 1);

    // Older session starts are ignored
    let stale = enabled_at - ChronoDuration::hours(1);
    store
        .set(PRESENCE_COLLECTION, "bob", object(json!({ "locationEnabledAt": stale })), true)
        .await
        .unwrap();
    let newer = enabled_at + ChronoDuration::hours(1);
    store
        .set(PRESENCE_COLLECTION, "bob", object(json!({ "locationEnabledAt": newer })), true)
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, WatcherEvent::FriendWentLive(PresenceEvent::new("bob", newer)));
}
