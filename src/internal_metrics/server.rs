//! # Metrics Server
//!
//! This module defines the `MetricsServer`, which is responsible for running
//! an `axum`-based web server to expose the collected metrics to a Prometheus
//! scraper.
//!
//! The server provides a single endpoint, `/metrics`, which, when scraped,
//! returns the current state of all registered metrics in the Prometheus
//! exposition format.
//!
//! The server stops serving when the shutdown flag is set.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

use crate::utils::shutdown::wait_for_shutdown;

/// A server that exposes metrics to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `prom_handle` - A `PrometheusHandle` used to render the metrics.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            prom_handle,
            mut shutdown_rx,
        } = self;
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let prom_handle = prom_handle.clone();
                async move { prom_handle.render() }
            }),
        );

        async move {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    trace!("Metrics server received shutdown signal via select.");
                }
                result = axum::serve(listener, app.into_make_service()) => {
                    if let Err(e) = result {
                        error!(error = %e, "Metrics server error");
                    }
                }
            }
            trace!("Metrics server task finished.");
        }
    }
}
