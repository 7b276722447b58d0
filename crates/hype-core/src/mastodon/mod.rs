//! Mastodon API client, per-host registry, and entity types.
//!
//! Provides a trait-based client abstraction for the handful of API
//! operations the engine needs. Implementations include
//! [`HttpMastodonClient`] for real API calls and mock implementations in
//! tests.

pub mod client;
pub mod registry;
pub mod types;

pub use client::HttpMastodonClient;
pub use registry::{ClientProvider, ClientRegistry};
pub use types::*;

use crate::error::ApiError;

/// Trait abstracting the Mastodon API operations the engine performs.
#[async_trait::async_trait]
pub trait MastodonApi: Send + Sync {
    /// Fetch the host's currently trending statuses, up to `limit`.
    /// Available without authentication on most hosts.
    async fn trending_statuses(&self, limit: u32) -> Result<Vec<Status>, ApiError>;

    /// Fetch the host's local public timeline, up to `limit`.
    /// Requires authentication.
    async fn timeline_local(&self, limit: u32) -> Result<Vec<Status>, ApiError>;

    /// Reblog a status by id on this host.
    async fn status_reblog(&self, status_id: &str) -> Result<Status, ApiError>;

    /// Search statuses by query. With `resolve = true` the host will
    /// attempt a cross-host fetch for an unknown URI, making the post
    /// locally known (federation).
    async fn search_statuses(&self, query: &str, resolve: bool)
        -> Result<Vec<Status>, ApiError>;
}
