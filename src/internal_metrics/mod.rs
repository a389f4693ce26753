//! # Internal Metrics Module
//!
//! Counters are recorded with the `metrics` macros at their call sites. This
//! module registers their descriptions and, when a listen address is
//! configured, installs a Prometheus recorder and builds the `/metrics`
//! server.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;

/// Registers descriptions for every metric threadwatch emits.
pub fn describe() {
    metrics::describe_counter!(
        "events_evaluated_total",
        Unit::Count,
        "Total number of events evaluated against the filters."
    );
    metrics::describe_counter!(
        "filter_matches_total",
        Unit::Count,
        "Number of events selected by each filter."
    );
    metrics::describe_counter!(
        "notifications_sent_total",
        Unit::Count,
        "Total number of notifications accepted by the sink."
    );
    metrics::describe_counter!(
        "dispatch_failures_total",
        Unit::Count,
        "Failed notification sends, labeled by failure kind."
    );
    metrics::describe_counter!(
        "feed_items_total",
        Unit::Count,
        "New items seen by the feed poller, labeled by kind."
    );
    metrics::describe_counter!(
        "feed_poll_errors_total",
        Unit::Count,
        "Total number of failed feed polls."
    );
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and binds the scrape endpoint.
    ///
    /// Returns `None` when no listen address is configured; the `metrics`
    /// macros are then no-ops.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Option<(MetricsServer, SocketAddr)>> {
        let Some(listen_address) = self.config.listen_address else {
            return Ok(None);
        };

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let listener = TcpListener::bind(listen_address)
            .await
            .with_context(|| format!("failed to bind metrics server to {}", listen_address))?;
        let addr = listener
            .local_addr()
            .context("failed to get local address for metrics server")?;

        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
        describe();

        Ok(Some((MetricsServer::new(listener, handle, shutdown_rx), addr)))
    }
}
