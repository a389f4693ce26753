//! Per-event filter evaluation and notification dispatch.

use crate::core::{NormalizedEvent, NotificationSink, SinkError};
use crate::filters::FilterSet;
use crate::formatting::NotificationRenderer;
use crate::utils::shutdown::wait_for_shutdown;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(60);

/// The successful outcomes of [`AlertDispatcher::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No filter matched; nothing was sent.
    Skipped,
    /// A notification for the named filter was accepted by the sink.
    Delivered { filter: String },
}

/// A failure to deliver the notification for a single event.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("rate limited posting {permalink} from r/{forum} (retry after {retry_after:?})")]
    RateLimited {
        forum: String,
        permalink: String,
        retry_after: Option<Duration>,
    },

    #[error("timed out after {timeout:?} posting {permalink} from r/{forum}")]
    Timeout {
        forum: String,
        permalink: String,
        timeout: Duration,
    },

    #[error("cancelled while posting {permalink} from r/{forum}")]
    Cancelled { forum: String, permalink: String },

    #[error("error posting {permalink} from r/{forum} to webhook: {source}")]
    Send {
        forum: String,
        permalink: String,
        #[source]
        source: SinkError,
    },
}

impl DispatchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DispatchError::RateLimited { .. })
    }

    /// How long the sink asked us to wait, when it said.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DispatchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn forum(&self) -> &str {
        match self {
            DispatchError::RateLimited { forum, .. }
            | DispatchError::Timeout { forum, .. }
            | DispatchError::Cancelled { forum, .. }
            | DispatchError::Send { forum, .. } => forum,
        }
    }

    pub fn permalink(&self) -> &str {
        match self {
            DispatchError::RateLimited { permalink, .. }
            | DispatchError::Timeout { permalink, .. }
            | DispatchError::Cancelled { permalink, .. }
            | DispatchError::Send { permalink, .. } => permalink,
        }
    }

    /// A short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RateLimited { .. } => "rate_limited",
            DispatchError::Timeout { .. } => "timeout",
            DispatchError::Cancelled { .. } => "cancelled",
            DispatchError::Send { .. } => "send",
        }
    }
}

/// Evaluates events against the filters and sends notifications for matches.
///
/// Holds no mutable state, so a single instance can be shared across tasks.
pub struct AlertDispatcher {
    filters: Arc<FilterSet>,
    renderer: NotificationRenderer,
    sink: Arc<dyn NotificationSink>,
    event_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(
        filters: Arc<FilterSet>,
        renderer: NotificationRenderer,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            filters,
            renderer,
            sink,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }

    /// Overrides the per-event time budget.
    pub fn with_event_timeout(mut self, event_timeout: Duration) -> Self {
        self.event_timeout = event_timeout;
        self
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Evaluates a single event.
    ///
    /// The send is abandoned when `event_timeout` elapses or when `shutdown`
    /// flips to `true`, whichever happens first.
    pub async fn evaluate(
        &self,
        event: NormalizedEvent,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Outcome, DispatchError> {
        let deadline = Instant::now() + self.event_timeout;
        metrics::counter!("events_evaluated_total").increment(1);

        let Some(filter) = self.filters.find_match(&event) else {
            debug!(forum = %event.forum, permalink = %event.permalink, "No filter matched");
            return Ok(Outcome::Skipped);
        };
        let filter_name = filter.name().to_string();
        metrics::counter!("filter_matches_total", "filter" => filter_name.clone()).increment(1);

        let notification = self.renderer.render(&event, &filter_name);
        info!(filter = %filter_name, url = %notification.url, "Matched filter");

        let mut shutdown = shutdown.clone();
        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                return Err(DispatchError::Cancelled {
                    forum: event.forum,
                    permalink: event.permalink,
                });
            }
            result = tokio::time::timeout_at(deadline, self.sink.send(&notification)) => result,
        };

        match result {
            Ok(Ok(())) => {
                metrics::counter!("notifications_sent_total").increment(1);
                Ok(Outcome::Delivered {
                    filter: filter_name,
                })
            }
            Ok(Err(SinkError::RateLimited { retry_after })) => Err(DispatchError::RateLimited {
                forum: event.forum,
                permalink: event.permalink,
                retry_after,
            }),
            Ok(Err(source)) => Err(DispatchError::Send {
                forum: event.forum,
                permalink: event.permalink,
                source,
            }),
            Err(_) => Err(DispatchError::Timeout {
                forum: event.forum,
                permalink: event.permalink,
                timeout: self.event_timeout,
            }),
        }
    }
}
