//! A sink that logs notifications instead of sending them.
//!
//! Used in dry-run mode to validate filters without posting anything.

use crate::core::{Notification, NotificationSink, SinkError};
use async_trait::async_trait;
use tracing::{info, instrument};

#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    #[instrument(skip_all, fields(url = %notification.url))]
    async fn send(&self, notification: &Notification) -> Result<(), SinkError> {
        info!(
            title = %notification.title,
            author = %notification.author.name,
            filter = notification.field("Filter").unwrap_or_default(),
            "Dry run, not posting notification"
        );
        Ok(())
    }
}
