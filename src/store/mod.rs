//! Client-side state stores.

pub mod metrics;
pub mod tasks;

pub use metrics::MetricsStore;
pub use tasks::{StatusRegression, TaskFilters, TaskStore, TrackingConfig};
