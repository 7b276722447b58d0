//! Boost publication with an opt-in federation fallback.
//!
//! The cheap path assumes the publishing host already has the post in its
//! local database and reblogs by id. When that comes back not-found, the
//! post has not federated to the publishing host yet; resolving it via
//! search triggers a cross-host fetch, which is deliberately opt-in
//! because operators may not want the bot causing those. All protocol
//! errors are translated into skip reasons at this boundary; nothing
//! propagates.

use std::sync::Arc;

use crate::mastodon::{MastodonApi, Status};
use crate::reason::SkipReason;

/// Result of one publish attempt.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The boost went out; carries the post as stored on the publishing
    /// host (the resolved copy when federation was needed).
    Success(Status),
    /// The candidate was passed over for the given stable reason.
    Skipped(SkipReason),
}

/// Publishes boosts through the home client.
pub struct Publisher {
    home: Arc<dyn MastodonApi>,
    federate_missing_statuses: bool,
}

impl Publisher {
    pub fn new(home: Arc<dyn MastodonApi>, federate_missing_statuses: bool) -> Self {
        Self {
            home,
            federate_missing_statuses,
        }
    }

    /// Attempt to boost `status`. Never fails; every error path maps to a
    /// `Skipped` outcome.
    pub async fn publish(&self, status: &Status, origin: &str) -> PublishOutcome {
        match self.home.status_reblog(&status.id).await {
            Ok(_) => PublishOutcome::Success(status.clone()),
            Err(err) if err.is_not_found() => self.federate_and_retry(status, origin).await,
            Err(err) => {
                tracing::warn!(origin, uri = %status.uri, %err, "reblog failed");
                PublishOutcome::Skipped(SkipReason::ReblogError)
            }
        }
    }

    /// The publishing host does not know this post. Resolve it via search
    /// (when allowed) and reblog the resolved copy.
    async fn federate_and_retry(&self, status: &Status, origin: &str) -> PublishOutcome {
        if !self.federate_missing_statuses {
            tracing::debug!(origin, uri = %status.uri, "post not local and federation disabled");
            return PublishOutcome::Skipped(SkipReason::FederationDisabled);
        }

        let resolved = match self.home.search_statuses(&status.uri, true).await {
            Ok(statuses) => statuses,
            Err(err) if err.is_unauthorized() => {
                tracing::warn!(
                    origin,
                    uri = %status.uri,
                    %err,
                    "search requires a token with read:search scope; adjust the bot token"
                );
                return PublishOutcome::Skipped(SkipReason::TokenScopeMissing);
            }
            Err(err) => {
                tracing::warn!(origin, uri = %status.uri, %err, "resolve failed");
                return PublishOutcome::Skipped(SkipReason::ResolveRejected);
            }
        };

        let Some(federated) = resolved.into_iter().next() else {
            tracing::debug!(origin, uri = %status.uri, "resolve returned no statuses");
            return PublishOutcome::Skipped(SkipReason::ResolveEmpty);
        };

        match self.home.status_reblog(&federated.id).await {
            Ok(_) => PublishOutcome::Success(federated),
            Err(err) => {
                tracing::warn!(origin, uri = %status.uri, %err, "reblog failed after resolve");
                PublishOutcome::Skipped(SkipReason::ReblogAfterResolve)
            }
        }
    }
}
