//! Notification sinks.
//!
//! Every sink implements [`crate::core::NotificationSink`]. The dispatcher
//! only ever sees the trait object, so the webhook client and the dry-run
//! logger are interchangeable.
pub mod log_sink;
pub mod webhook;

pub use log_sink::LogSink;
pub use webhook::DiscordWebhook;
