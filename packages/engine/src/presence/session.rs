use std::future;
use std::sync::Arc;

use beacon_entity::{Coordinate, PRESENCE_COLLECTION, PresenceDocument, UserKey, UserPresence};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use super::{Command, HiddenReason, SessionEvent, TransitionOutcome};
use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::Result;
use crate::store::{Document, DocumentStore, StoreError, object, to_document};

/// A transition write that failed and must be re-sent in full
enum Unsynced {
    /// Fields of the enable document, location excluded
    Visible(Document),
    Hidden,
}

/// Owns one user's presence and both session timers
pub(crate) struct SessionActor<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: PresenceConfig,
    presence: UserPresence,
    /// Latest device fix, kept while hidden so enabling can publish it
    device_location: Option<Coordinate>,
    /// Whether a location went out during the current session
    published: bool,
    /// Visibility the store has not acknowledged yet
    unsynced: Option<Unsynced>,
    expires_at: Option<Instant>,
    ticker: Option<Interval>,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: DocumentStore> SessionActor<S> {
    pub(crate) fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        user: UserKey,
        config: PresenceConfig,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            presence: UserPresence::hidden(user),
            device_location: None,
            published: false,
            unsynced: None,
            expires_at: None,
            ticker: None,
            commands,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(user = %self.presence.user, "presence session started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.disable(HiddenReason::Shutdown).await;
                        let _ = reply.send(());
                        break;
                    },
                    Some(command) => self.handle(command).await,
                    // Every handle dropped
                    None => {
                        self.disable(HiddenReason::Shutdown).await;
                        break;
                    },
                },
                () = expiry(self.expires_at) => {
                    self.disable(HiddenReason::Expired).await;
                }
                () = tick(self.ticker.as_mut()) => {
                    self.broadcast().await;
                }
            }
        }

        debug!(user = %self.presence.user, "presence session stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Enable { reply } => {
                let _ = reply.send(self.enable().await);
            },
            Command::Disable { reply } => {
                let _ = reply.send(Ok(self.disable(HiddenReason::UserRequest).await));
            },
            Command::Toggle { reply } => {
                let outcome = if self.presence.visible {
                    Ok(self.disable(HiddenReason::UserRequest).await)
                } else {
                    self.enable().await
                };
                let _ = reply.send(outcome);
            },
            Command::UpdateLocation { coordinate, reply } => {
                self.device_location = Some(coordinate);
                if self.unsynced.is_some() {
                    self.resync().await;
                } else if self.presence.visible && !self.published {
                    self.broadcast().await;
                }
                let _ = reply.send(self.presence.clone());
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.presence.clone());
            },
            // Handled by the run loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            },
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn outcome(&self, changed: bool, write_error: Option<StoreError>) -> TransitionOutcome {
        TransitionOutcome { presence: self.presence.clone(), changed, write_error }
    }

    async fn write(&self, fields: Document) -> std::result::Result<(), StoreError> {
        let limit = self.config.write_timeout();
        match timeout(limit, self.store.set(PRESENCE_COLLECTION, &self.presence.user, fields, true)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "presence write timed out after {}s",
                limit.as_secs()
            ))),
        }
    }

    async fn enable(&mut self) -> Result<TransitionOutcome> {
        if self.presence.visible {
            let retry = self.resync().await;
            return Ok(self.outcome(false, retry));
        }

        let now = self.clock.now();
        let document = PresenceDocument {
            visibility: true,
            location: self.device_location,
            location_enabled_at: Some(now),
        };
        let fields = to_document(PRESENCE_COLLECTION, &self.presence.user, &document)?;

        let write_error = match self.write(fields.clone()).await {
            Ok(()) => {
                self.unsynced = None;
                None
            },
            Err(e @ StoreError::PermissionDenied(_)) => {
                error!(user = %self.presence.user, error = %e, "enabling visibility rejected");
                return Err(e.into());
            },
            Err(e) => {
                warn!(user = %self.presence.user, error = %e, "visibility write failed, enabling locally");
                self.emit(SessionEvent::WriteFailed { error: e.clone() });
                let mut pending = fields;
                pending.remove("location");
                self.unsynced = Some(Unsynced::Visible(pending));
                Some(e)
            },
        };

        self.presence.enter_visible(now, self.device_location);
        self.published = self.device_location.is_some();

        let period = self.config.broadcast_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.expires_at = Some(Instant::now() + self.config.auto_disable_after());

        info!(user = %self.presence.user, enabled_at = %now, "visibility enabled");
        self.emit(SessionEvent::Visible { enabled_at: now });
        if let Some(coordinate) = self.device_location {
            self.emit(SessionEvent::LocationPublished { coordinate });
        }

        Ok(self.outcome(true, write_error))
    }

    async fn disable(&mut self, reason: HiddenReason) -> TransitionOutcome {
        if !self.presence.visible {
            let retry = self.resync().await;
            return self.outcome(false, retry);
        }

        self.expires_at = None;

        // locationEnabledAt stays, friends compare against it
        let write_error = match self.write(hidden_fields()).await {
            Ok(()) => {
                self.unsynced = None;
                self.ticker = None;
                None
            },
            Err(e) => {
                // The ticker stays to retry the hide
                warn!(user = %self.presence.user, error = %e, "visibility write failed, hiding locally");
                self.emit(SessionEvent::WriteFailed { error: e.clone() });
                self.unsynced = Some(Unsynced::Hidden);
                Some(e)
            },
        };

        self.presence.enter_hidden();
        self.published = false;

        info!(user = %self.presence.user, ?reason, "visibility disabled");
        self.emit(SessionEvent::Hidden { reason });
        self.outcome(true, write_error)
    }

    /// Re-send the last transition the store missed. Returns the error if it failed again.
    async fn resync(&mut self) -> Option<StoreError> {
        let fields = match self.unsynced.as_ref()? {
            Unsynced::Visible(fields) => {
                let mut fields = fields.clone();
                let location = self.device_location.map_or(serde_json::Value::Null, location_value);
                fields.insert("location".to_string(), location);
                fields
            },
            Unsynced::Hidden => hidden_fields(),
        };

        if let Err(e) = self.write(fields).await {
            warn!(user = %self.presence.user, error = %e, "presence resync failed");
            self.emit(SessionEvent::WriteFailed { error: e.clone() });
            return Some(e);
        }

        match self.unsynced.take() {
            Some(Unsynced::Visible(_)) => {
                if let Some(coordinate) = self.device_location {
                    self.presence.publish_location(coordinate);
                    self.published = true;
                    self.emit(SessionEvent::LocationPublished { coordinate });
                }
            },
            Some(Unsynced::Hidden) => self.ticker = None,
            None => {},
        }
        info!(user = %self.presence.user, visible = self.presence.visible, "presence resynced");
        None
    }

    async fn broadcast(&mut self) {
        if self.unsynced.is_some() {
            self.resync().await;
            return;
        }
        if !self.presence.visible {
            return;
        }
        let Some(coordinate) = self.device_location else {
            debug!(user = %self.presence.user, "no location fix to broadcast");
            return;
        };

        let mut fields = Document::new();
        fields.insert("location".to_string(), location_value(coordinate));
        match self.write(fields).await {
            Ok(()) => {
                self.presence.publish_location(coordinate);
                self.published = true;
                debug!(user = %self.presence.user, %coordinate, "location broadcast");
                self.emit(SessionEvent::LocationPublished { coordinate });
            },
            Err(e) => {
                warn!(user = %self.presence.user, error = %e, "location broadcast failed");
                self.emit(SessionEvent::BroadcastFailed { error: e });
            },
        }
    }
}

fn hidden_fields() -> Document {
    object(json!({ "visibility": false, "location": null }))
}

fn location_value(coordinate: Coordinate) -> serde_json::Value {
    json!({ "lat": coordinate.lat, "lon": coordinate.lon })
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        },
        None => future::pending().await,
    }
}
