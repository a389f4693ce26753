#![allow(dead_code)]

pub mod fake_feed;
pub mod mock_sink;

use chrono::{TimeZone, Utc};
use threadwatch::core::NormalizedEvent;
use threadwatch::filters::RawFilter;

/// Builds an event with the given routing fields and placeholder content.
pub fn event(forum: &str, author: &str, text: &str) -> NormalizedEvent {
    NormalizedEvent {
        author: author.to_string(),
        forum: forum.to_string(),
        filterable_text: text.to_string(),
        title: format!("Post by {}", author),
        body: text.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 4, 10, 30, 0).unwrap(),
        permalink: format!("/r/{}/comments/abc123/post/", forum),
    }
}

pub fn raw_filter(name: &str, forums: &[&str], text_regex: &str, author_regex: &str) -> RawFilter {
    RawFilter {
        name: name.to_string(),
        forums: forums.iter().map(|f| f.to_string()).collect(),
        text_regex: text_regex.to_string(),
        author_regex: author_regex.to_string(),
    }
}
