//! Configuration management for threadwatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a TOML or JSON file and merge it with
//! environment variables and command-line arguments.

use crate::cli::Cli;
use crate::filters::RawFilter;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Log notifications instead of posting them to the webhook.
    #[serde(default)]
    pub dry_run: bool,
    /// Prefix for permalinks and author profile links.
    pub site_base_url: String,
    pub dispatch: DispatchConfig,
    pub webhook: WebhookConfig,
    pub feed: FeedConfig,
    pub metrics: MetricsConfig,
    /// Filters in evaluation order.
    #[serde(default)]
    pub filters: Vec<RawFilter>,
}

/// Configuration for the alert dispatcher.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Time budget for matching, rendering and sending a single event.
    pub event_timeout_secs: u64,
    /// How long to pause after being rate limited when the sink gives no hint.
    pub rate_limit_cooldown_secs: u64,
    /// Capacity of the queue between the feed poller and the dispatcher.
    pub queue_capacity: usize,
}

impl DispatchConfig {
    pub fn event_timeout(&self) -> Duration {
        Duration::from_secs(self.event_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

/// Identity of the webhook notifications are posted to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebhookConfig {
    pub id: String,
    pub token: String,
    pub api_base_url: String,
    pub user_agent: String,
}

/// Configuration for the feed poller.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeedConfig {
    pub base_url: String,
    pub user_agent: String,
    pub polling_period_secs: u64,
    /// Upper bound on remembered item ids.
    pub seen_cache_size: u64,
    pub seen_cache_ttl_secs: u64,
}

impl FeedConfig {
    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_secs)
    }

    pub fn seen_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.seen_cache_ttl_secs)
    }
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `/metrics` on this address when set.
    #[serde(default)]
    pub listen_address: Option<SocketAddr>,
}

impl Config {
    /// Loads the application configuration by layering defaults, the config
    /// file, `THREADWATCH_` environment variables, and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = &cli.config {
            figment = if is_json(path) {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
            figment = merge_flat_keys(figment);
        }

        let config: Config = figment
            // e.g. THREADWATCH_WEBHOOK__TOKEN=...
            .merge(Env::prefixed("THREADWATCH_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

/// Top-level keys of the flat legacy layout and where they live now.
const FLAT_KEYS: [(&str, &str); 3] = [
    ("webhookID", "webhook.id"),
    ("webhookToken", "webhook.token"),
    ("redditUserAgent", "feed.user_agent"),
];

/// Lifts flat legacy keys from the file into their nested sections, at file
/// precedence so env and CLI still override them.
fn merge_flat_keys(mut figment: Figment) -> Figment {
    for (flat, nested) in FLAT_KEYS {
        if let Ok(value) = figment.extract_inner::<String>(flat) {
            figment = figment.merge(Serialized::default(nested, value));
        }
    }
    figment
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dry_run: false,
            site_base_url: crate::formatting::DEFAULT_SITE_BASE_URL.to_string(),
            dispatch: DispatchConfig {
                event_timeout_secs: 60,
                rate_limit_cooldown_secs: 300,
                queue_capacity: 1000,
            },
            webhook: WebhookConfig {
                id: String::new(),
                token: String::new(),
                api_base_url: "https://discord.com/api".to_string(),
                user_agent: concat!("threadwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            feed: FeedConfig {
                base_url: "https://www.reddit.com".to_string(),
                user_agent: concat!("threadwatch/", env!("CARGO_PKG_VERSION")).to_string(),
                polling_period_secs: 300,
                seen_cache_size: 100_000,
                seen_cache_ttl_secs: 86_400,
            },
            metrics: MetricsConfig::default(),
            filters: Vec::new(),
        }
    }
}
