//! Diversity checks: seen-cache hits, per-author daily caps, and
//! per-hashtag per-run caps.
//!
//! The seen cache and author tallies live in durable [`BotState`]; the
//! hashtag multiset is cycle-local and reset at the top of every run.

use std::collections::HashMap;

use crate::config::Config;
use crate::mastodon::Status;
use crate::reason::SkipReason;
use crate::state::BotState;

/// Cycle-local diversity bookkeeping. Never persisted.
#[derive(Debug, Default)]
pub struct RunState {
    /// Lowercased hashtag → boosts this run.
    hashtags_boosted: HashMap<String, u32>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often a hashtag has been boosted this run.
    pub fn hashtag_count(&self, tag: &str) -> u32 {
        self.hashtags_boosted.get(tag).copied().unwrap_or(0)
    }

    /// Whether a hashtag was boosted at all this run.
    pub fn has_hashtag(&self, tag: &str) -> bool {
        self.hashtags_boosted.contains_key(tag)
    }
}

/// Seen/blocked checks and post-publish recording.
pub struct DiversityTracker {
    author_diversity_enforced: bool,
    max_boosts_per_author_per_day: u32,
    hashtag_diversity_enforced: bool,
    max_boosts_per_hashtag_per_run: u32,
}

impl DiversityTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            author_diversity_enforced: config.author_diversity_enforced,
            max_boosts_per_author_per_day: config.max_boosts_per_author_per_day,
            hashtag_diversity_enforced: config.hashtag_diversity_enforced,
            max_boosts_per_hashtag_per_run: config.max_boosts_per_hashtag_per_run,
        }
    }

    /// `Some(reason)` when the post is already seen or blocked by a
    /// diversity cap.
    pub fn blocked(
        &self,
        status: &Status,
        state: &BotState,
        run: &RunState,
    ) -> Option<SkipReason> {
        if status.reblogged
            || state.seen_contains(&status.id)
            || state.seen_contains(&status.uri)
        {
            return Some(SkipReason::AlreadySeen);
        }
        if self.author_diversity_enforced
            && state.author_count(&status.account.acct) >= self.max_boosts_per_author_per_day
        {
            return Some(SkipReason::AuthorLimit);
        }
        if self.hashtag_diversity_enforced {
            for tag in status.tag_names() {
                if run.hashtag_count(&tag) >= self.max_boosts_per_hashtag_per_run {
                    return Some(SkipReason::HashtagLimit);
                }
            }
        }
        None
    }

    /// Record a successful boost: seen keys, author tally, run hashtags.
    pub fn record(&self, status: &Status, state: &mut BotState, run: &mut RunState) {
        state.remember(&status.id, &status.uri);
        state.count_author(&status.account.acct);
        for tag in status.tag_names() {
            *run.hashtags_boosted.entry(tag).or_insert(0) += 1;
        }
    }
}
