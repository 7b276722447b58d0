//! Candidate ingestion: trending posts from every subscribed host plus
//! the publishing host's local timeline.
//!
//! A failing host contributes nothing for the cycle and never takes the
//! other hosts down with it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{Config, HostSubscription};
use crate::mastodon::{ClientProvider, MastodonApi, Status};

/// Sentinel origin name for local-timeline candidates.
pub const LOCAL_ORIGIN: &str = "@local";

/// A post under consideration in the current cycle, tagged with where it
/// came from. Scores are filled in by the engine.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub status: Status,
    pub origin: String,
    pub raw_score: f64,
    pub normalized_score: f64,
}

impl Candidate {
    fn new(status: Status, origin: &str) -> Self {
        Self {
            status,
            origin: origin.to_string(),
            raw_score: 0.0,
            normalized_score: 0.0,
        }
    }
}

/// Pulls candidates from remote hosts and the local timeline.
pub struct CandidateSource {
    provider: Arc<dyn ClientProvider>,
    home: Arc<dyn MastodonApi>,
    subscriptions: Vec<HostSubscription>,
    local_timeline_enabled: bool,
    local_timeline_fetch_limit: u32,
    local_timeline_min_engagement: u64,
}

impl CandidateSource {
    pub fn new(
        config: &Config,
        provider: Arc<dyn ClientProvider>,
        home: Arc<dyn MastodonApi>,
    ) -> Self {
        Self {
            provider,
            home,
            subscriptions: config.subscribed_instances.clone(),
            local_timeline_enabled: config.local_timeline_enabled,
            local_timeline_fetch_limit: config.local_timeline_fetch_limit,
            local_timeline_min_engagement: config.local_timeline_min_engagement,
        }
    }

    /// Fetch all candidates for one cycle. Per-host failures are logged
    /// and swallowed.
    pub async fn fetch_all(&self, now: DateTime<Utc>) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for subscription in &self.subscriptions {
            match self.fetch_host(subscription).await {
                Ok(statuses) => {
                    tracing::debug!(
                        host = %subscription.name,
                        count = statuses.len(),
                        "fetched trending statuses"
                    );
                    candidates.extend(
                        statuses
                            .into_iter()
                            .map(|s| Candidate::new(s, &subscription.name)),
                    );
                }
                Err(err) => {
                    tracing::error!(host = %subscription.name, %err, "trending fetch failed");
                }
            }
        }

        if self.local_timeline_enabled {
            match self.home.timeline_local(self.local_timeline_fetch_limit).await {
                Ok(statuses) => {
                    let kept: Vec<Candidate> = statuses
                        .into_iter()
                        .filter(|s| self.local_qualifies(s, now))
                        .map(|s| Candidate::new(s, LOCAL_ORIGIN))
                        .collect();
                    tracing::debug!(count = kept.len(), "local timeline candidates");
                    candidates.extend(kept);
                }
                Err(err) => {
                    tracing::error!(%err, "local timeline fetch failed");
                }
            }
        }

        candidates
    }

    async fn fetch_host(&self, subscription: &HostSubscription) -> Result<Vec<Status>, crate::error::ApiError> {
        let client = self.provider.client_for(&subscription.name).await?;
        client.trending_statuses(subscription.fetch_limit).await
    }

    /// Local posts must be from today (UTC) and meet the engagement floor.
    fn local_qualifies(&self, status: &Status, now: DateTime<Utc>) -> bool {
        let today = match status.created_at {
            Some(created) => created.date_naive() == now.date_naive(),
            None => false,
        };
        today && status.engagement() >= self.local_timeline_min_engagement
    }
}
