//! Test doubles for the notification sink.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use threadwatch::core::{Notification, NotificationSink, SinkError};
use tokio::sync::Notify;

/// Records every notification it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub notifier: Arc<Notify>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub async fn wait_for_count(&self, target: usize, timeout: Duration) {
        let wait = async {
            while self.count() < target {
                self.notifier.notified().await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .expect("Timed out waiting for notifications");
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn send(&self, notification: &Notification) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(notification.clone());
        self.notifier.notify_one();
        Ok(())
    }
}

/// Fails every send with an error built by the given closure.
#[derive(Clone)]
pub struct FailingSink {
    pub make_error: Arc<dyn Fn() -> SinkError + Send + Sync>,
    pub attempts: Arc<Mutex<usize>>,
}

impl FailingSink {
    pub fn new(make_error: impl Fn() -> SinkError + Send + Sync + 'static) -> Self {
        Self {
            make_error: Arc::new(make_error),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::new(move || SinkError::RateLimited { retry_after })
    }

    pub fn server_error() -> Self {
        Self::new(|| SinkError::Status {
            status: 500,
            body: "internal error".to_string(),
        })
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn send(&self, _notification: &Notification) -> Result<(), SinkError> {
        *self.attempts.lock().unwrap() += 1;
        Err((self.make_error)())
    }
}

/// Never completes a send.
#[derive(Clone, Default)]
pub struct HangingSink;

#[async_trait]
impl NotificationSink for HangingSink {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn send(&self, _notification: &Notification) -> Result<(), SinkError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
