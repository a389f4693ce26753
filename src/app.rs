//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{NormalizedEvent, NotificationSink},
    dispatcher::{AlertDispatcher, DispatchError, Outcome},
    feed::{FeedError, FeedPoller, FeedSource, RedditClient},
    filters::FilterSet,
    formatting::NotificationRenderer,
    internal_metrics::MetricsBuilder,
    notification::{DiscordWebhook, LogSink},
    task_manager::TaskManager,
    utils::shutdown::{self, wait_for_shutdown},
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    feed_task: Option<JoinHandle<Result<(), FeedError>>>,
    stop_tx: Arc<watch::Sender<bool>>,
    rate_limit_cooldown: Duration,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Runs until the shutdown signal, or until the feed poller fails.
    ///
    /// When the feed rate limits us, waits out the cooldown and then returns
    /// the error rather than hammering the feed.
    pub async fn run(self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();

        let result = match self.feed_task {
            Some(mut feed_task) => {
                let joined = tokio::select! {
                    biased;
                    _ = wait_for_shutdown(&mut stop_rx) => None,
                    joined = &mut feed_task => Some(joined),
                };
                match joined {
                    Some(joined) => {
                        Self::handle_feed_exit(joined, self.rate_limit_cooldown, &mut stop_rx).await
                    }
                    None => {
                        info!("Shutdown signal received. Waiting for tasks to complete...");
                        match feed_task.await {
                            Ok(Ok(())) => debug!("Feed poller stopped."),
                            Ok(Err(e)) => warn!(error = %e, "Feed poller failed during shutdown"),
                            Err(e) => error!(error = %e, "Feed poller task panicked"),
                        }
                        Ok(())
                    }
                }
            }
            None => {
                wait_for_shutdown(&mut stop_rx).await;
                info!("Shutdown signal received. Waiting for tasks to complete...");
                Ok(())
            }
        };

        let _ = self.stop_tx.send(true);
        self.task_manager.shutdown().await;
        result
    }

    async fn handle_feed_exit(
        joined: Result<Result<(), FeedError>, tokio::task::JoinError>,
        cooldown: Duration,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        match joined {
            Ok(Ok(())) => {
                info!("Feed poller finished.");
                Ok(())
            }
            Ok(Err(e @ FeedError::RateLimited { .. })) => {
                error!(?cooldown, "Got 429 from feed, waiting before exiting");
                tokio::select! {
                    biased;
                    _ = wait_for_shutdown(stop_rx) => {}
                    _ = tokio::time::sleep(cooldown) => {}
                }
                Err(e).context("feed rate limited")
            }
            Ok(Err(e)) => Err(e).context("feed poller failed"),
            Err(e) => Err(e).context("feed poller task panicked"),
        }
    }
}

/// Builder for the main application.
///
/// Components can be overridden for testing.
pub struct AppBuilder {
    config: Config,
    sink_override: Option<Arc<dyn NotificationSink>>,
    feed_source_override: Option<Arc<dyn FeedSource>>,
    events_rx_for_test: Option<mpsc::Receiver<NormalizedEvent>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sink_override: None,
            feed_source_override: None,
            events_rx_for_test: None,
        }
    }

    /// Overrides the notification sink.
    pub fn sink_override(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink_override = Some(sink);
        self
    }

    /// Overrides the feed source polled for new items.
    pub fn feed_source_override(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.feed_source_override = Some(source);
        self
    }

    /// Feeds events from this receiver instead of spawning a feed poller.
    pub fn events_rx_for_test(mut self, rx: mpsc::Receiver<NormalizedEvent>) -> Self {
        self.events_rx_for_test = Some(rx);
        self
    }

    /// Builds and initializes all application components.
    ///
    /// Fails if any filter is invalid or the webhook identity is malformed.
    #[instrument(skip_all)]
    pub async fn build(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;

        // Internal stop signal, raised on external shutdown or when the feed fails.
        let (stop_tx, stop_rx) = shutdown::channel();
        let stop_tx = Arc::new(stop_tx);
        let task_manager = TaskManager::new(stop_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let metrics_addr = match MetricsBuilder::new(config.metrics.clone())
            .build(task_manager.get_shutdown_rx())
            .await?
        {
            Some((server, addr)) => {
                info!(%addr, "Serving metrics");
                task_manager.spawn("MetricsServer", server.run());
                Some(addr)
            }
            None => None,
        };

        // =========================================================================
        // 2. Filters, sink, dispatcher
        // =========================================================================
        let filters = Arc::new(
            FilterSet::new(&config.filters).context("invalid filter configuration")?,
        );
        if filters.is_empty() {
            warn!("No filters configured; nothing will ever alert.");
        }
        info!(count = filters.len(), forums = ?filters.forums(), "Loaded filters");

        let sink: Arc<dyn NotificationSink> = match self.sink_override {
            Some(sink) => sink,
            None if config.dry_run => Arc::new(LogSink),
            None => Arc::new(DiscordWebhook::new(&config.webhook)?),
        };
        info!(sink = sink.name(), "Using notification sink");

        let dispatcher = Arc::new(
            AlertDispatcher::new(
                filters.clone(),
                NotificationRenderer::new(config.site_base_url.clone()),
                sink,
            )
            .with_event_timeout(config.dispatch.event_timeout()),
        );

        // =========================================================================
        // 3. Feed
        // =========================================================================
        let (events_rx, feed_task) = match self.events_rx_for_test {
            Some(rx) => (rx, None),
            None => {
                let (tx, rx) = mpsc::channel(config.dispatch.queue_capacity.max(1));
                let source: Arc<dyn FeedSource> = match self.feed_source_override {
                    Some(source) => source,
                    None => Arc::new(RedditClient::new(&config.feed)?),
                };
                let poller = FeedPoller::new(source, filters.forums(), &config.feed, tx);
                let handle = tokio::spawn(poller.run(task_manager.get_shutdown_rx()));
                (rx, Some(handle))
            }
        };

        // =========================================================================
        // 4. Dispatch loop
        // =========================================================================
        task_manager.spawn(
            "Dispatcher",
            run_dispatch_loop(
                dispatcher,
                events_rx,
                config.dispatch.rate_limit_cooldown(),
                task_manager.get_shutdown_rx(),
            ),
        );

        // Ends on external shutdown, or when the app stops on its own.
        {
            let stop_tx = stop_tx.clone();
            let mut stop_rx = task_manager.get_shutdown_rx();
            task_manager.spawn("ShutdownForwarder", async move {
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown_rx) => {
                        let _ = stop_tx.send(true);
                    }
                    _ = wait_for_shutdown(&mut stop_rx) => {}
                }
            });
        }

        Ok(App {
            task_manager,
            feed_task,
            stop_tx,
            rate_limit_cooldown: config.dispatch.rate_limit_cooldown(),
            metrics_addr,
        })
    }
}

/// Evaluates events one at a time until shutdown or the channel closes.
///
/// Failures are logged and the loop moves on to the next event. A rate limit
/// pauses consumption, which lets the bounded queue push back on the poller.
pub async fn run_dispatch_loop(
    dispatcher: Arc<AlertDispatcher>,
    mut events_rx: mpsc::Receiver<NormalizedEvent>,
    rate_limit_cooldown: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Dispatcher started.");
    loop {
        let event = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
            event = events_rx.recv() => match event {
                Some(event) => event,
                None => {
                    info!("Event channel closed.");
                    break;
                }
            },
        };

        debug!(
            forum = %event.forum,
            author = %event.author,
            title = %event.title,
            "Evaluating event"
        );
        match dispatcher.evaluate(event, &shutdown_rx).await {
            Ok(Outcome::Skipped) => {}
            Ok(Outcome::Delivered { filter }) => debug!(%filter, "Notification delivered"),
            Err(e) => {
                metrics::counter!("dispatch_failures_total", "kind" => e.kind()).increment(1);
                match &e {
                    DispatchError::RateLimited { retry_after, .. } => {
                        let pause = retry_after.unwrap_or(rate_limit_cooldown);
                        warn!(
                            forum = %e.forum(),
                            permalink = %e.permalink(),
                            ?pause,
                            "Webhook rate limited, pausing dispatch"
                        );
                        tokio::select! {
                            biased;
                            _ = wait_for_shutdown(&mut shutdown_rx) => break,
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                    DispatchError::Cancelled { .. } => break,
                    _ => error!(
                        forum = %e.forum(),
                        permalink = %e.permalink(),
                        error = %e,
                        "Failed to dispatch notification"
                    ),
                }
            }
        }
    }
    info!("Dispatcher shutting down.");
}
