//! Core domain types and service traits for threadwatch
//!
//! This module defines the data that flows through the alert pipeline and the
//! trait contract for the sinks that notifications are delivered to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A single post or comment, reduced to the fields the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    /// Author username, may be empty
    pub author: String,
    /// The forum (subreddit) the item was posted in
    pub forum: String,
    /// All text the text predicate of a filter searches
    pub filterable_text: String,
    /// Rendering only, never matched against
    pub title: String,
    /// Rendering only, never matched against
    pub body: String,
    /// When the item was created
    pub created_at: DateTime<Utc>,
    /// Site-relative link, e.g. `/r/rust/comments/abc/title/`
    pub permalink: String,
}

/// The rendered payload for a single matched event.
///
/// Serializes to the shape of a Discord embed object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    pub author: EmbedAuthor,
    pub timestamp: DateTime<Utc>,
    pub thumbnail: EmbedThumbnail,
    pub fields: Vec<EmbedField>,
}

impl Notification {
    /// Returns the value of the named field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// Failures reported by a [`NotificationSink`].
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink asked us to back off.
    #[error("rate limited by sink (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("sink responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request to sink failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers rendered notifications to their destination
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A short, descriptive name for the sink (e.g., "discord", "log").
    /// Used for logging.
    fn name(&self) -> &str;

    /// Sends a single notification.
    ///
    /// # Returns
    /// * `Ok(())` if the destination accepted the notification
    /// * `Err(SinkError::RateLimited)` if the destination signalled backpressure
    /// * `Err` for any other failure (network error, non-success response)
    async fn send(&self, notification: &Notification) -> Result<(), SinkError>;
}
