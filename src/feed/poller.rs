//! Periodic polling with a seen-item cache.

use super::{FeedError, FeedItem, FeedSource};
use crate::config::FeedConfig;
use crate::core::NormalizedEvent;
use crate::utils::shutdown::wait_for_shutdown;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Polls a [`FeedSource`] and forwards items it has not seen before.
///
/// Items present on the first successful poll only prime the cache, so a
/// restart does not re-alert on the current front page.
pub struct FeedPoller {
    source: Arc<dyn FeedSource>,
    forums: Vec<String>,
    seen: Cache<String, ()>,
    polling_period: Duration,
    events_tx: mpsc::Sender<NormalizedEvent>,
}

impl FeedPoller {
    pub fn new(
        source: Arc<dyn FeedSource>,
        forums: Vec<String>,
        config: &FeedConfig,
        events_tx: mpsc::Sender<NormalizedEvent>,
    ) -> Self {
        let seen = Cache::builder()
            .time_to_live(config.seen_cache_ttl())
            .max_capacity(config.seen_cache_size)
            .build();
        Self {
            source,
            forums,
            seen,
            polling_period: config.polling_period(),
            events_tx,
        }
    }

    /// Overrides the configured polling period.
    pub fn with_polling_period(mut self, polling_period: Duration) -> Self {
        self.polling_period = polling_period;
        self
    }

    /// Fetches once and returns the unseen items, oldest first.
    pub async fn poll_once(&self) -> Result<Vec<FeedItem>, FeedError> {
        let mut items = self.source.fetch(&self.forums).await?;
        items.sort_by(|a, b| a.created_utc().total_cmp(&b.created_utc()));

        let mut fresh = Vec::new();
        for item in items {
            if self.seen.contains_key(item.id()) {
                continue;
            }
            self.seen.insert(item.id().to_string(), ()).await;
            metrics::counter!("feed_items_total", "kind" => item.kind()).increment(1);
            fresh.push(item);
        }
        Ok(fresh)
    }

    /// Runs until shutdown, the event channel closes, or the feed rate limits us.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), FeedError> {
        info!(forums = ?self.forums, period = ?self.polling_period, "Feed poller started.");
        let mut timer = tokio::time::interval(self.polling_period.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut primed = false;

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = timer.tick() => {}
            }

            let items = match self.poll_once().await {
                Ok(items) => items,
                Err(e @ FeedError::RateLimited { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Feed poll failed");
                    metrics::counter!("feed_poll_errors_total").increment(1);
                    continue;
                }
            };

            if !primed {
                primed = true;
                info!(count = items.len(), "Primed seen cache with existing items");
                continue;
            }

            debug!(count = items.len(), "Forwarding new feed items");
            for item in items {
                tokio::select! {
                    biased;
                    _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
                    sent = self.events_tx.send(item.into_event()) => {
                        if sent.is_err() {
                            info!("Event channel closed. Feed poller shutting down.");
                            return Ok(());
                        }
                    }
                }
            }
        }

        info!("Feed poller received shutdown signal.");
        Ok(())
    }
}
