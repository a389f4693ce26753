//! Client for the public Reddit listing endpoints.

use super::{Comment, FeedError, FeedItem, FeedSource, Post};
use crate::config::FeedConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Parses a raw listing JSON document into feed items.
///
/// Entries of kinds other than `t3` (post) and `t1` (comment) are skipped.
pub fn parse_listing(text: &str) -> Result<Vec<FeedItem>, FeedError> {
    #[derive(Deserialize)]
    struct Listing {
        data: ListingData,
    }

    #[derive(Deserialize)]
    struct ListingData {
        children: Vec<Thing>,
    }

    #[derive(Deserialize)]
    struct Thing {
        kind: String,
        data: serde_json::Value,
    }

    let listing: Listing = serde_json::from_str(text)?;
    let mut items = Vec::with_capacity(listing.data.children.len());
    for thing in listing.data.children {
        match thing.kind.as_str() {
            "t3" => items.push(FeedItem::Post(serde_json::from_value::<Post>(thing.data)?)),
            "t1" => items.push(FeedItem::Comment(serde_json::from_value::<Comment>(
                thing.data,
            )?)),
            other => debug!(kind = other, "Skipping listing entry"),
        }
    }
    Ok(items)
}

/// Polls `/r/<forums>/new` and `/r/<forums>/comments`.
pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
}

impl RedditClient {
    pub fn new(config: &FeedConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build feed HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_listing(&self, forums: &str, listing: &str) -> Result<Vec<FeedItem>, FeedError> {
        let url = format!("{}/r/{}/{}.json", self.base_url, forums, listing);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", "100"), ("raw_json", "1")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(%url, ?retry_after, "Feed rate limited the request");
            return Err(FeedError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let items = parse_listing(&text)?;
        debug!(%url, count = items.len(), "Fetched listing");
        Ok(items)
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn fetch(&self, forums: &[String]) -> Result<Vec<FeedItem>, FeedError> {
        if forums.is_empty() {
            return Ok(Vec::new());
        }
        let joined = forums.join("+");
        let mut items = self.fetch_listing(&joined, "new").await?;
        items.extend(self.fetch_listing(&joined, "comments").await?);
        Ok(items)
    }
}
