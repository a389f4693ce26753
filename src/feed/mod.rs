//! The feed producer.
//!
//! A [`FeedSource`] fetches the latest posts and comments for a set of
//! forums; the [`poller::FeedPoller`] calls it periodically, drops items it
//! has already seen, and forwards the rest to the dispatcher as
//! [`NormalizedEvent`]s.

pub mod poller;
pub mod reddit;

use crate::core::NormalizedEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub use poller::FeedPoller;
pub use reddit::RedditClient;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("rate limited by feed (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("feed responded with status {status}")]
    Status { status: u16 },

    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse feed listing: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A submission, as returned in a `t3` listing entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Post {
    /// Fullname, e.g. `t3_abc123`
    pub name: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub created_utc: f64,
    pub permalink: String,
}

/// A comment, as returned in a `t1` listing entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Comment {
    /// Fullname, e.g. `t1_def456`
    pub name: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub body: String,
    /// Title of the post the comment belongs to
    #[serde(default)]
    pub link_title: String,
    pub created_utc: f64,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Post(Post),
    Comment(Comment),
}

impl FeedItem {
    /// The globally unique fullname of the item.
    pub fn id(&self) -> &str {
        match self {
            FeedItem::Post(p) => &p.name,
            FeedItem::Comment(c) => &c.name,
        }
    }

    pub fn created_utc(&self) -> f64 {
        match self {
            FeedItem::Post(p) => p.created_utc,
            FeedItem::Comment(c) => c.created_utc,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedItem::Post(_) => "post",
            FeedItem::Comment(_) => "comment",
        }
    }

    pub fn into_event(self) -> NormalizedEvent {
        match self {
            FeedItem::Post(post) => NormalizedEvent {
                filterable_text: format!("{}{}", post.title, post.selftext),
                created_at: timestamp(post.created_utc),
                author: post.author,
                forum: post.subreddit,
                title: post.title,
                body: post.selftext,
                permalink: post.permalink,
            },
            FeedItem::Comment(comment) => NormalizedEvent {
                filterable_text: comment.body.clone(),
                created_at: timestamp(comment.created_utc),
                author: comment.author,
                forum: comment.subreddit,
                title: comment.link_title,
                body: comment.body,
                permalink: comment.permalink,
            },
        }
    }
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(created_utc as i64, 0).unwrap_or_default()
}

/// Fetches the newest items for a set of forums
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Returns the newest posts and comments across `forums`, in any order.
    async fn fetch(&self, forums: &[String]) -> Result<Vec<FeedItem>, FeedError>;
}
