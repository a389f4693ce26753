//! threadwatch - posts new forum content matching user-defined filters to a webhook.

use anyhow::Result;
use clap::Parser;
use threadwatch::{app::App, cli::Cli, config::Config, utils::shutdown};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("threadwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Dry Run: {}", config.dry_run);
    info!("Site Base URL: {}", config.site_base_url);
    info!("Feed Base URL: {}", config.feed.base_url);
    info!("Polling Period: {}s", config.feed.polling_period_secs);
    info!("Event Timeout: {}s", config.dispatch.event_timeout_secs);
    info!("Rate Limit Cooldown: {}s", config.dispatch.rate_limit_cooldown_secs);
    info!("Webhook ID: {}", config.webhook.id);
    info!("Filters: {}", config.filters.len());
    match config.metrics.listen_address {
        Some(addr) => info!("Metrics Address: {}", addr),
        None => info!("Metrics Address: Disabled"),
    }
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("threadwatch stopped.");
    Ok(())
}
