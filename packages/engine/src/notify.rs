//! Local notification sink used to alert the user when a friend goes live.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The notification backend failed to schedule the notification
    #[error("Notification backend error: {0}")]
    Backend(String),

    /// The platform refused to show notifications
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Schedules user-visible notifications on the local device.
///
/// Delivery is fire-and-forget: callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        delay: Duration,
    ) -> Result<(), NotifyError>;
}

/// Sink that only records notifications in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        info!(title, body, delay_ms = delay.as_millis() as u64, "notification scheduled");
        Ok(())
    }
}
