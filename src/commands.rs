use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use beacon_engine::entity::{Coordinate, FRIENDS_COLLECTION, NOTES_COLLECTION, Place};
use beacon_engine::store::object;
use beacon_engine::{
    DocumentStore, FriendWatcher, LogSink, MemoryStore, NotificationSink, PlaceService,
    PresenceHandle, PresenceSession, SessionEvent, TokioClock, WatcherEvent, geo,
};
use clap::Args;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Args, Debug)]
pub struct PlacesArgs {
    /// JSON array of note documents
    #[arg(long)]
    pub notes: PathBuf,

    /// Current location as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    pub at: Option<Coordinate>,

    /// Number of pages to print
    #[arg(long, default_value_t = 1)]
    pub pages: usize,

    /// Owner of the notes
    #[arg(long, default_value = "me")]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// User sharing their location
    #[arg(long)]
    pub user: String,

    /// Friend to watch, repeatable
    #[arg(long = "friend")]
    pub friends: Vec<String>,

    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub run_secs: Option<u64>,

    /// Run a visible session for every friend so the watcher has something to report
    #[arg(long)]
    pub simulate_friends: bool,
}

/// Load notes from a file, then print ranked places page by page.
pub async fn places(config: &AppConfig, args: PlacesArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.notes)
        .with_context(|| format!("Failed to read notes from {}", args.notes.display()))?;
    let documents: Vec<Value> =
        serde_json::from_str(&contents).with_context(|| format!("{} is not a JSON array", args.notes.display()))?;

    let store = Arc::new(MemoryStore::new());
    for (index, document) in documents.into_iter().enumerate() {
        let Value::Object(mut fields) = document else {
            warn!(index, "skipping non-object note entry");
            continue;
        };
        let key = match fields.remove("id") {
            Some(Value::String(id)) => id,
            _ => format!("note-{index}"),
        };
        fields.entry("user").or_insert_with(|| Value::String(args.user.clone()));
        store.set(NOTES_COLLECTION, &key, fields, false).await?;
    }

    let mut service = PlaceService::new(store, args.user.clone(), &config.engine.places);
    if let Some(at) = args.at {
        service.set_current_location(at);
    }
    service.refresh().await?;
    info!(places = service.places().len(), "places loaded");

    if service.places().is_empty() {
        println!("No places for {}", args.user);
        return Ok(());
    }

    let mut printed = 0;
    for page in 1..=args.pages.max(1) {
        let visible = service.load_next_page();
        println!("-- page {page} --");
        for (rank, place) in visible.iter().enumerate().skip(printed) {
            println!("{}", describe(rank + 1, place, args.at));
        }
        printed = visible.len();

        if !service.has_more() {
            break;
        }
    }

    for place in service.visible() {
        if let Some(thumbnail) = service.thumbnail_for(&place.name) {
            println!("thumbnail for {}: {}", place.name, thumbnail);
        }
    }

    Ok(())
}

fn describe(rank: usize, place: &Place, at: Option<Coordinate>) -> String {
    let notes = if place.member_note_count == 1 { "note" } else { "notes" };
    match at {
        Some(at) => format!(
            "{rank:>3}. {} ({} {notes}, {:.2} km)",
            place.name,
            place.member_note_count,
            geo::distance(at, place.representative_coordinate) / 1000.0
        ),
        None => format!("{rank:>3}. {} ({} {notes})", place.name, place.member_note_count),
    }
}

/// Share presence and watch friends until Ctrl-C or the timeout.
pub async fn session(config: &AppConfig, args: SessionArgs) -> Result<()> {
    #[cfg(feature = "desktop")]
    if config.desktop_notifications {
        return run_session(config, args, Arc::new(crate::desktop::DesktopSink)).await;
    }

    run_session(config, args, Arc::new(LogSink)).await
}

async fn run_session<N: NotificationSink>(config: &AppConfig, args: SessionArgs, sink: Arc<N>) -> Result<()> {
    if args.friends.iter().any(|friend| friend == &args.user) {
        bail!("{} cannot be their own friend", args.user);
    }

    let store = Arc::new(MemoryStore::new());
    store
        .set(FRIENDS_COLLECTION, &args.user, object(json!({ "friends": args.friends })), false)
        .await?;

    let mut watcher =
        FriendWatcher::start(store.clone(), sink, args.user.clone(), config.engine.notifications.clone()).await?;
    let mut watcher_events = watcher.subscribe();

    let clock = Arc::new(TokioClock::new());
    let session = PresenceSession::spawn(store.clone(), clock.clone(), args.user.clone(), config.engine.presence.clone());
    let mut session_events = session.subscribe();

    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        session.update_location(Coordinate::try_new(lat, lon)?).await?;
    }
    let outcome = session.enable().await?;
    if let Some(error) = outcome.write_error {
        warn!(error = %error, "presence write failed, sharing locally");
    }

    let mut friends: Vec<PresenceHandle> = Vec::new();
    if args.simulate_friends {
        for friend in watcher.friends() {
            let handle = PresenceSession::spawn(store.clone(), clock.clone(), friend.clone(), config.engine.presence.clone());
            handle.enable().await?;
            friends.push(handle);
        }
    }

    let deadline = async {
        match args.run_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
            () = &mut deadline => break,
            event = session_events.recv() => match event {
                Ok(event) => println!("[{}] {}", args.user, describe_session_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "session events dropped"),
                Err(RecvError::Closed) => break,
            },
            event = watcher_events.recv() => match event {
                Ok(WatcherEvent::FriendWentLive(event)) => {
                    println!("[friends] {} went live at {}", event.friend, event.enabled_at.to_rfc3339());
                },
                Ok(WatcherEvent::SubscriptionFailed { friend, error }) => {
                    println!("[friends] stopped watching {friend}: {error}");
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watcher events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    for friend in &friends {
        friend.shutdown().await;
    }
    session.shutdown().await;
    watcher.stop();

    if let Some(doc) = store.get(beacon_engine::entity::PRESENCE_COLLECTION, &args.user).await? {
        info!(document = %serde_json::Value::Object(doc), "final presence");
    }
    Ok(())
}

fn describe_session_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Visible { enabled_at } => format!("visible since {}", enabled_at.to_rfc3339()),
        SessionEvent::Hidden { reason } => format!("hidden ({reason:?})"),
        SessionEvent::LocationPublished { coordinate } => format!("location published at {coordinate}"),
        SessionEvent::BroadcastFailed { error } => format!("broadcast failed: {error}"),
        SessionEvent::WriteFailed { error } => format!("presence write failed: {error}"),
    }
}
