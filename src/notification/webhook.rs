//! A client for posting notifications to a Discord webhook.

use crate::config::WebhookConfig;
use crate::core::{Notification, NotificationSink, SinkError};
use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Posts each notification as a single embed to a webhook.
pub struct DiscordWebhook {
    client: reqwest::Client,
    endpoint: String,
}

impl DiscordWebhook {
    /// Creates a new `DiscordWebhook`.
    ///
    /// Fails if the webhook id is not a numeric snowflake or the token is empty.
    pub fn new(config: &WebhookConfig) -> anyhow::Result<Self> {
        let id: u64 = config
            .id
            .trim()
            .parse()
            .with_context(|| format!("invalid webhook id {:?}", config.id))?;
        if config.token.trim().is_empty() {
            bail!("webhook token is empty");
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build webhook HTTP client")?;

        let endpoint = format!(
            "{}/webhooks/{}/{}?wait=true",
            config.api_base_url.trim_end_matches('/'),
            id,
            config.token.trim()
        );

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhook {
    fn name(&self) -> &str {
        "discord"
    }

    #[instrument(skip_all, fields(url = %notification.url))]
    async fn send(&self, notification: &Notification) -> Result<(), SinkError> {
        let payload = json!({ "embeds": [notification] });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to webhook failed");
                SinkError::Transport(e)
            })?;

        let status = response.status();
        if status.is_success() {
            info!("Posted notification to webhook.");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_hint = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_seconds);
            let body = response.text().await.unwrap_or_default();
            let retry_after = header_hint.or_else(|| retry_after_from_body(&body));
            warn!(?retry_after, "Webhook rate limited the notification");
            return Err(SinkError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            status = %status,
            body = %body,
            "Failed to post notification to webhook"
        );
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parses a delay in (possibly fractional) seconds.
fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn retry_after_from_body(body: &str) -> Option<Duration> {
    #[derive(Deserialize)]
    struct RateLimitBody {
        retry_after: f64,
    }

    let parsed: RateLimitBody = serde_json::from_str(body).ok()?;
    Duration::try_from_secs_f64(parsed.retry_after).ok()
}
