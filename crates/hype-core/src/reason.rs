//! Stable skip-reason codes for operational triage.
//!
//! Every candidate the engine passes over is logged with one of these
//! codes. The codes are part of the operational contract: dashboards and
//! alerts grep for them, so the `Display` strings never change.

/// Why a candidate was not boosted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Post id or URI already in the seen cache, or already reblogged.
    AlreadySeen,
    /// Author hit the per-day diversity cap.
    AuthorLimit,
    /// A hashtag on the post hit the per-run diversity cap.
    HashtagLimit,
    /// Author's home host is on the filtered-instances list.
    FilteredHost,
    /// Post has no media while `require_media` is set.
    RequireMedia,
    /// Post is sensitive without a content warning.
    Sensitive,
    /// Post language is not in the allowlist (or undetectable).
    Language,
    /// Reblogs, favourites, or replies below a configured floor.
    EngagementFloor,
    /// Raw score below `min_score_threshold`.
    QualityBelowThreshold,
    /// Hourly public cap exhausted.
    HourCap,
    /// Daily public cap exhausted.
    DayCap,
    /// `max_boosts_per_run` reached.
    RunCap,
    /// Per-source boost limit for the candidate's origin reached.
    SourceLimit,
    /// Post unknown to the publishing host and federation is disabled.
    FederationDisabled,
    /// Federation search returned no statuses.
    ResolveEmpty,
    /// Reblog failed even after a successful federation resolve.
    ReblogAfterResolve,
    /// Federation search rejected the token (missing scope).
    TokenScopeMissing,
    /// Federation search failed with a non-auth API error.
    ResolveRejected,
    /// Reblog failed with an error other than not-found.
    ReblogError,
}

impl SkipReason {
    /// The stable code emitted in logs.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::AlreadySeen => "already-seen",
            SkipReason::AuthorLimit => "author-limit",
            SkipReason::HashtagLimit => "hashtag-limit",
            SkipReason::FilteredHost => "filtered-host",
            SkipReason::RequireMedia => "require-media",
            SkipReason::Sensitive => "sensitive",
            SkipReason::Language => "language",
            SkipReason::EngagementFloor => "engagement-floor",
            SkipReason::QualityBelowThreshold => "quality-below-threshold",
            SkipReason::HourCap => "hour-cap",
            SkipReason::DayCap => "day-cap",
            SkipReason::RunCap => "run-cap",
            SkipReason::SourceLimit => "source-limit",
            SkipReason::FederationDisabled => "federation-disabled",
            SkipReason::ResolveEmpty => "resolve-empty",
            SkipReason::ReblogAfterResolve => "reblog-after-resolve",
            SkipReason::TokenScopeMissing => "token-scope-missing",
            SkipReason::ResolveRejected => "resolve-rejected",
            SkipReason::ReblogError => "reblog-error",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SkipReason::AlreadySeen.to_string(), "already-seen");
        assert_eq!(SkipReason::AuthorLimit.to_string(), "author-limit");
        assert_eq!(SkipReason::HashtagLimit.to_string(), "hashtag-limit");
        assert_eq!(SkipReason::FilteredHost.to_string(), "filtered-host");
        assert_eq!(SkipReason::RequireMedia.to_string(), "require-media");
        assert_eq!(SkipReason::Sensitive.to_string(), "sensitive");
        assert_eq!(SkipReason::Language.to_string(), "language");
        assert_eq!(SkipReason::EngagementFloor.to_string(), "engagement-floor");
        assert_eq!(
            SkipReason::QualityBelowThreshold.to_string(),
            "quality-below-threshold"
        );
        assert_eq!(SkipReason::HourCap.to_string(), "hour-cap");
        assert_eq!(SkipReason::DayCap.to_string(), "day-cap");
        assert_eq!(SkipReason::RunCap.to_string(), "run-cap");
        assert_eq!(SkipReason::SourceLimit.to_string(), "source-limit");
        assert_eq!(
            SkipReason::FederationDisabled.to_string(),
            "federation-disabled"
        );
        assert_eq!(SkipReason::ResolveEmpty.to_string(), "resolve-empty");
        assert_eq!(
            SkipReason::ReblogAfterResolve.to_string(),
            "reblog-after-resolve"
        );
        assert_eq!(
            SkipReason::TokenScopeMissing.to_string(),
            "token-scope-missing"
        );
        assert_eq!(SkipReason::ResolveRejected.to_string(), "resolve-rejected");
        assert_eq!(SkipReason::ReblogError.to_string(), "reblog-error");
    }
}
