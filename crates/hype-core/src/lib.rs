//! Core library for hype, a trending-post curation bot for
//! Mastodon-compatible hosts.
//!
//! On every scheduler tick the [`engine::BoostEngine`] pulls trending
//! posts from the subscribed hosts (plus the publishing host's local
//! timeline), filters them against content policy, ranks them by a
//! composite score, and boosts the best candidates within the configured
//! rate and diversity caps. Durable state in a JSON document keeps the
//! bot honest across restarts.

pub mod config;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod mastodon;
pub mod publish;
pub mod reason;
pub mod scoring;
pub mod state;

pub use config::Config;
pub use engine::BoostEngine;
pub use error::{ApiError, ConfigError, StateError};
pub use reason::SkipReason;
