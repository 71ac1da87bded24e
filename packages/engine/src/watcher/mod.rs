//! Watches a user's friends and reports each new visibility session once.

mod dedup;

pub use dedup::PresenceDeduper;

use std::sync::Arc;

use beacon_entity::{
    FRIENDS_COLLECTION, FriendListDocument, PRESENCE_COLLECTION, PresenceDocument, PresenceEvent,
    UserKey,
};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::error::Result;
use crate::notify::NotificationSink;
use crate::store::{ChangeKind, DocumentStore, Filter, StoreError, from_document};

const OBSERVATION_CHANNEL_CAPACITY: usize = 128;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events published by a friend watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherEvent {
    /// A friend started a visibility session not seen before
    FriendWentLive(PresenceEvent),
    /// Watching this friend stopped; other friends are unaffected
    SubscriptionFailed { friend: UserKey, error: StoreError },
}

/// Entry point for friend presence watching
pub struct FriendWatcher;

impl FriendWatcher {
    /// Read `owner`'s friend list and watch every friend's presence.
    ///
    /// The friend list is read once; friends added later are picked up by
    /// starting a new watcher.
    pub async fn start<S, N>(
        store: Arc<S>,
        sink: Arc<N>,
        owner: impl Into<UserKey>,
        config: NotificationConfig,
    ) -> Result<WatcherHandle>
    where
        S: DocumentStore,
        N: NotificationSink,
    {
        let owner = owner.into();
        let friends: Vec<UserKey> = match store.get(FRIENDS_COLLECTION, &owner).await? {
            Some(document) => {
                let list: FriendListDocument = from_document(FRIENDS_COLLECTION, &owner, &document)?;
                list.links(&owner).into_iter().map(|link| link.friend).collect()
            },
            None => Vec::new(),
        };

        info!(owner = %owner, friends = friends.len(), "watching friends");

        let (events, initial) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (observations, receiver) = mpsc::channel(OBSERVATION_CHANNEL_CAPACITY);

        let mut tasks = Vec::with_capacity(friends.len() + 1);
        tasks.push(tokio::spawn(notify_loop(receiver, sink, config, events.clone())));
        for friend in &friends {
            tasks.push(tokio::spawn(watch_friend(
                store.clone(),
                friend.clone(),
                observations.clone(),
                events.clone(),
            )));
        }

        Ok(WatcherHandle { owner, friends, events, initial: Some(initial), tasks, stopped: false })
    }
}

/// Running friend watcher. Dropping it stops every subscription.
pub struct WatcherHandle {
    owner: UserKey,
    friends: Vec<UserKey>,
    events: broadcast::Sender<WatcherEvent>,
    initial: Option<broadcast::Receiver<WatcherEvent>>,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl WatcherHandle {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Friends being watched
    pub fn friends(&self) -> &[UserKey] {
        &self.friends
    }

    /// Receive watcher events. The first receiver sees everything since start.
    pub fn subscribe(&mut self) -> broadcast::Receiver<WatcherEvent> {
        self.initial.take().unwrap_or_else(|| self.events.subscribe())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Abort every subscription task. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.stopped = true;
        info!(owner = %self.owner, "friend watcher stopped");
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward every session start seen on `friend`'s presence document.
async fn watch_friend<S: DocumentStore>(
    store: Arc<S>,
    friend: UserKey,
    observations: mpsc::Sender<PresenceEvent>,
    events: broadcast::Sender<WatcherEvent>,
) {
    let mut changes = match store.subscribe(PRESENCE_COLLECTION, Filter::key(friend.as_str())).await {
        Ok(changes) => changes,
        Err(error) => {
            warn!(friend = %friend, error = %error, "presence subscription failed");
            let _ = events.send(WatcherEvent::SubscriptionFailed { friend, error });
            return;
        },
    };

    while let Some(item) = changes.next().await {
        let change = match item {
            Ok(change) => change,
            Err(StoreError::Lagged(skipped)) => {
                warn!(friend = %friend, skipped, "presence subscription lagged");
                continue;
            },
            Err(error) => {
                warn!(friend = %friend, error = %error, "presence subscription ended");
                let _ = events.send(WatcherEvent::SubscriptionFailed { friend, error });
                return;
            },
        };

        if change.kind == ChangeKind::Removed {
            continue;
        }

        let document: PresenceDocument =
            match from_document(PRESENCE_COLLECTION, &change.key, &change.document) {
                Ok(document) => document,
                Err(e) => {
                    warn!(friend = %friend, error = %e, "skipping malformed presence document");
                    continue;
                },
            };

        let Some(enabled_at) = document.location_enabled_at else {
            continue;
        };

        if observations.send(PresenceEvent::new(friend.clone(), enabled_at)).await.is_err() {
            // Watcher stopped
            return;
        }
    }
}

/// Single consumer of all observations; owns the dedup state.
async fn notify_loop<N: NotificationSink>(
    mut observations: mpsc::Receiver<PresenceEvent>,
    sink: Arc<N>,
    config: NotificationConfig,
    events: broadcast::Sender<WatcherEvent>,
) {
    let mut deduper = PresenceDeduper::new();

    while let Some(observation) = observations.recv().await {
        let Some(event) = deduper.observe(observation) else {
            debug!("duplicate presence observation suppressed");
            continue;
        };

        info!(friend = %event.friend, enabled_at = %event.enabled_at, "friend went live");

        let (title, body) = config.render(&event.friend);
        if let Err(e) = sink.schedule_local_notification(&title, &body, config.delay()).await {
            warn!(friend = %event.friend, error = %e, "failed to schedule notification");
        }

        let _ = events.send(WatcherEvent::FriendWentLive(event));
    }
}
