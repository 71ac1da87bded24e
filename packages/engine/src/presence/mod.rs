//! One user's visibility lifecycle: enable, periodic location broadcast,
//! auto-expiry and disable.
//!
//! Each session runs as a single actor task. [`PresenceHandle`] is the only
//! way in, so transitions, location updates, broadcast ticks and expiry are
//! serialized without locks.

mod session;

use std::sync::Arc;

use beacon_entity::{Coordinate, PRESENCE_COLLECTION, Timestamp, UserKey, UserPresence};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::{Error, Result};
use crate::store::{DocumentStore, StoreError};
use session::SessionActor;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why a session went hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenReason {
    UserRequest,
    /// The auto-disable window elapsed
    Expired,
    /// The session was shut down while visible
    Shutdown,
}

/// Events published by a presence session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Visible { enabled_at: Timestamp },
    Hidden { reason: HiddenReason },
    LocationPublished { coordinate: Coordinate },
    /// A periodic location write failed; retried on the next tick
    BroadcastFailed { error: StoreError },
    /// A transition write failed; the local transition still happened and the
    /// full state is re-sent on the next tick or request
    WriteFailed { error: StoreError },
}

/// Result of an enable, disable or toggle request
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// Presence after the request
    pub presence: UserPresence,
    /// False when the request was a no-op
    pub changed: bool,
    /// Store failure of the transition write, if any
    pub write_error: Option<StoreError>,
}

pub(crate) enum Command {
    Enable { reply: oneshot::Sender<Result<TransitionOutcome>> },
    Disable { reply: oneshot::Sender<Result<TransitionOutcome>> },
    Toggle { reply: oneshot::Sender<Result<TransitionOutcome>> },
    UpdateLocation { coordinate: Coordinate, reply: oneshot::Sender<UserPresence> },
    Snapshot { reply: oneshot::Sender<UserPresence> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Entry point for presence sessions
pub struct PresenceSession;

impl PresenceSession {
    /// Start a hidden session for `user` on the current tokio runtime.
    ///
    /// The session stops on [`PresenceHandle::shutdown`] or once every handle
    /// is dropped, hiding the user first if needed.
    pub fn spawn<S: DocumentStore>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        user: impl Into<UserKey>,
        config: PresenceConfig,
    ) -> PresenceHandle {
        let user = user.into();
        let (commands, receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let actor = SessionActor::new(store, clock, user.clone(), config, receiver, events.clone());
        tokio::spawn(actor.run());

        PresenceHandle { user, commands, events }
    }
}

/// Cloneable handle to a running presence session
#[derive(Clone)]
pub struct PresenceHandle {
    user: UserKey,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl PresenceHandle {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn closed(&self) -> Error {
        Error::SessionClosed(self.user.clone())
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    /// Start sharing location. A no-op while already visible.
    pub async fn enable(&self) -> Result<TransitionOutcome> {
        self.request(|reply| Command::Enable { reply }).await?
    }

    /// Stop sharing location. A no-op while hidden.
    pub async fn disable(&self) -> Result<TransitionOutcome> {
        self.request(|reply| Command::Disable { reply }).await?
    }

    pub async fn toggle(&self) -> Result<TransitionOutcome> {
        self.request(|reply| Command::Toggle { reply }).await?
    }

    /// Record the device location; published on the next tick while visible.
    pub async fn update_location(&self, coordinate: Coordinate) -> Result<UserPresence> {
        let coordinate = coordinate
            .validated()
            .map_err(|e| Error::malformed(PRESENCE_COLLECTION, &self.user, e))?;
        self.request(|reply| Command::UpdateLocation { coordinate, reply }).await
    }

    pub async fn snapshot(&self) -> Result<UserPresence> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop the session, hiding the user if visible. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        // A closed session is already shut down
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }
}
