//! Helpers shared by unit and integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_entity::{Coordinate, NoteDocument};
use tokio::sync::Mutex;

use crate::notify::{NotificationSink, NotifyError};
use crate::store::Document;

/// One call made to a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub title: String,
    pub body: String,
    pub delay: Duration,
}

/// Notification sink that records every call, optionally failing them
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    scheduled: Arc<Mutex<Vec<ScheduledNotification>>>,
    failure: Arc<Mutex<Option<NotifyError>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail subsequent calls with `error` (still recording them)
    pub async fn fail_with(&self, error: Option<NotifyError>) {
        *self.failure.lock().await = error;
    }

    pub async fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.scheduled.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.scheduled.lock().await.len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        self.scheduled.lock().await.push(ScheduledNotification {
            title: title.to_string(),
            body: body.to_string(),
            delay,
        });

        match self.failure.lock().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Note document fields for `owner` as they appear in the `notes` collection.
pub fn note_document(owner: &str, location_name: &str, lat: f64, lon: f64) -> Document {
    let document = NoteDocument {
        user: owner.to_string(),
        text: format!("note at {location_name}"),
        location_name: location_name.to_string(),
        location: Coordinate::new(lat, lon),
        image_url: String::new(),
    };

    match serde_json::to_value(document) {
        Ok(serde_json::Value::Object(fields)) => fields,
        _ => Document::new(),
    }
}
