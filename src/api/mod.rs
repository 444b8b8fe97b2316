//! Backend API surface: wire types and the HTTP client.

pub mod client;
pub mod types;

pub use client::{events_url, HttpBackend, TaskBackend};
