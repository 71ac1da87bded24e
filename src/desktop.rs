use std::time::Duration;

use async_trait::async_trait;
use beacon_engine::{NotificationSink, NotifyError};
use tracing::{debug, warn};

const APP_NAME: &str = "beacon";

/// Shows friend notifications through the desktop notification service
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSink;

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        let title = title.to_string();
        let body = body.to_string();

        // Scheduling returns at once; the notification shows after `delay`.
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let shown = tokio::task::spawn_blocking(move || {
                notify_rust::Notification::new()
                    .appname(APP_NAME)
                    .summary(&title)
                    .body(&body)
                    .show()
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .await;

            match shown {
                Ok(Ok(())) => debug!("desktop notification shown"),
                Ok(Err(e)) => warn!(error = %e, "desktop notification failed"),
                Err(e) => warn!(error = %e, "desktop notification task failed"),
            }
        });

        Ok(())
    }
}
