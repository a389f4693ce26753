// src/formatting.rs

use crate::core::{EmbedAuthor, EmbedField, EmbedThumbnail, NormalizedEvent, Notification};

/// Accent color of every notification (Reddit orange).
pub const ACCENT_COLOR: u32 = 0xFF4500;
pub const LOGO_URL: &str = "https://www.redditinc.com/assets/images/site/reddit-logo.png";
pub const DEFAULT_SITE_BASE_URL: &str = "https://reddit.com";

/// Longest title a webhook embed accepts, in code points.
pub const MAX_TITLE_CHARS: usize = 256;
/// Longest description a webhook embed accepts, in code points.
pub const MAX_DESCRIPTION_CHARS: usize = 2048;

/// Truncates `s` to at most `max_chars` Unicode code points.
///
/// Never splits a multi-byte character and never allocates when the string
/// is already short enough.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Builds notifications for matched events.
#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    site_base_url: String,
}

impl Default for NotificationRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_BASE_URL)
    }
}

impl NotificationRenderer {
    pub fn new(site_base_url: impl Into<String>) -> Self {
        let site_base_url: String = site_base_url.into();
        Self {
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The absolute URL of a site-relative permalink.
    pub fn absolute_url(&self, permalink: &str) -> String {
        format!("{}{}", self.site_base_url, permalink)
    }

    pub fn author_url(&self, author: &str) -> String {
        format!("{}/u/{}", self.site_base_url, author)
    }

    pub fn render(&self, event: &NormalizedEvent, filter_name: &str) -> Notification {
        let url = self.absolute_url(&event.permalink);
        Notification {
            title: truncate(&event.title, MAX_TITLE_CHARS).to_string(),
            description: truncate(&event.body, MAX_DESCRIPTION_CHARS).to_string(),
            url: url.clone(),
            color: ACCENT_COLOR,
            author: EmbedAuthor {
                name: event.author.clone(),
                url: self.author_url(&event.author),
            },
            timestamp: event.created_at,
            thumbnail: EmbedThumbnail {
                url: LOGO_URL.to_string(),
            },
            fields: vec![
                EmbedField {
                    name: "Filter".to_string(),
                    value: filter_name.to_string(),
                },
                EmbedField {
                    name: "Link".to_string(),
                    value: url,
                },
            ],
        }
    }
}
