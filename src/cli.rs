//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Watches subreddits and posts matching content to a webhook.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (TOML, or JSON with a `.json` extension).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Period between feed polls, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub polling_period: Option<u64>,

    /// How long to wait after a 429 before resuming (webhook) or exiting (feed), in seconds.
    #[arg(long = "delay-429", value_name = "SECONDS")]
    pub delay_429: Option<u64>,

    /// Log notifications instead of posting them.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (e.g. "info", "threadwatch=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<SocketAddr>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(period) = self.polling_period {
            dict.insert("feed".into(), nested("polling_period_secs", Value::from(period)));
        }

        if let Some(delay) = self.delay_429 {
            dict.insert(
                "dispatch".into(),
                nested("rate_limit_cooldown_secs", Value::from(delay)),
            );
        }

        // Only an explicit flag overrides the file; absence keeps its value.
        if self.dry_run {
            dict.insert("dry_run".into(), Value::from(true));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(addr) = self.metrics_address {
            dict.insert(
                "metrics".into(),
                nested("listen_address", Value::from(addr.to_string())),
            );
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn nested(key: &str, value: Value) -> Value {
    let mut inner = Dict::new();
    inner.insert(key.to_string(), value);
    Value::from(inner)
}
