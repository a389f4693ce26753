/// threadwatch - watches forums and posts matching content to a webhook
///
/// This library provides the filter engine, the alert dispatcher, and the
/// feed and webhook collaborators around them.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod feed;
pub mod filters;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;
pub mod task_manager;
pub mod utils;

// Re-export core types for convenience
pub use crate::core::*;
