//! # taskdeck
//!
//! Client for an agent orchestrator backend.
//!
//! This library provides:
//! - A typed HTTP client for task submission, history, detail and metrics
//! - Live task tracking over server-sent events with a polling fallback
//! - State stores that keep task and metrics snapshots for a front end
//! - A command-line front end built on those stores
//!
//! ## Live tracking
//!
//! 1. A task is submitted and its detail fetched once
//! 2. A [`live::LiveUpdateController`] opens the task's event stream, or polls
//!    when a static API key is configured or no push transport exists
//! 3. Every status signal or polling tick re-fetches the full snapshot
//! 4. Tracking stops when the task completes or fails
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taskdeck::{api::HttpBackend, live::SseTransport, store::{TaskStore, TrackingConfig}, Config};
//!
//! let config = Config::from_env()?;
//! let store = TaskStore::new(
//!     Arc::new(HttpBackend::new(&config)?),
//!     Some(Arc::new(SseTransport::new())),
//!     TrackingConfig::from_config(&config),
//!     config.history_page_size,
//! );
//! let task_id = store.execute_task("Summarize the release notes", None).await?;
//! store.wait_for_tracking_end().await;
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod helpers;
pub mod live;
pub mod settings;
pub mod store;

pub use config::Config;
pub use error::ClientError;
