//! A scripted feed source.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use threadwatch::feed::{Comment, FeedError, FeedItem, FeedSource, Post};

/// Returns one scripted response per fetch; an empty list once exhausted.
#[derive(Clone, Default)]
pub struct FakeFeedSource {
    responses: Arc<Mutex<VecDeque<Result<Vec<FeedItem>, FeedError>>>>,
    pub requested_forums: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeFeedSource {
    pub fn new(responses: Vec<Result<Vec<FeedItem>, FeedError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requested_forums: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.requested_forums.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch(&self, forums: &[String]) -> Result<Vec<FeedItem>, FeedError> {
        self.requested_forums.lock().unwrap().push(forums.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn post(id: &str, subreddit: &str, author: &str, title: &str, created_utc: f64) -> FeedItem {
    FeedItem::Post(Post {
        name: format!("t3_{}", id),
        author: author.to_string(),
        subreddit: subreddit.to_string(),
        title: title.to_string(),
        selftext: String::new(),
        created_utc,
        permalink: format!("/r/{}/comments/{}/post/", subreddit, id),
    })
}

pub fn comment(id: &str, subreddit: &str, author: &str, body: &str, created_utc: f64) -> FeedItem {
    FeedItem::Comment(Comment {
        name: format!("t1_{}", id),
        author: author.to_string(),
        subreddit: subreddit.to_string(),
        body: body.to_string(),
        link_title: "Parent post".to_string(),
        created_utc,
        permalink: format!("/r/{}/comments/p/post/{}/", subreddit, id),
    })
}
