//! The boost engine: one `cycle()` per scheduler tick, selecting and
//! publishing the best candidates under the rate and diversity caps.
//!
//! Per-cycle flow: reset run state, check the public budget, ingest
//! candidates, score them, apply the quality gate, normalize and sort,
//! then admit in order until a cap closes the run. State is persisted
//! after every successful boost, so a crash never double-counts more
//! than the in-flight publish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::diversity::{DiversityTracker, RunState};
use crate::filter::ContentFilter;
use crate::ingest::{Candidate, CandidateSource, LOCAL_ORIGIN};
use crate::mastodon::{ClientProvider, MastodonApi};
use crate::publish::{PublishOutcome, Publisher};
use crate::reason::SkipReason;
use crate::scoring::{normalize_scores, ScoringEngine};
use crate::state::BotState;

pub struct BoostEngine {
    config: Config,
    state: BotState,
    scorer: ScoringEngine,
    filter: ContentFilter,
    diversity: DiversityTracker,
    source: CandidateSource,
    publisher: Publisher,
    /// Per-origin admission caps, fixed at construction.
    source_caps: HashMap<String, u32>,
}

impl BoostEngine {
    pub fn new(
        config: Config,
        provider: Arc<dyn ClientProvider>,
        home: Arc<dyn MastodonApi>,
    ) -> Self {
        let state = BotState::load(&config.state_path, config.seen_cache_size);

        let mut source_caps: HashMap<String, u32> = config
            .subscribed_instances
            .iter()
            .map(|s| (s.name.clone(), s.boost_limit))
            .collect();
        source_caps.insert(LOCAL_ORIGIN.to_string(), config.local_timeline_boost_limit);

        Self {
            scorer: ScoringEngine::new(&config),
            filter: ContentFilter::new(&config),
            diversity: DiversityTracker::new(&config),
            source: CandidateSource::new(&config, provider, home.clone()),
            publisher: Publisher::new(home, config.federate_missing_statuses),
            state,
            source_caps,
            config,
        }
    }

    /// Run one cycle immediately, then one every `interval` minutes until
    /// cancelled. Cycles never overlap; a long cycle delays the next tick.
    pub async fn run(&mut self, cancel: CancellationToken) {
        self.cycle().await;
        let interval = Duration::from_secs(self.config.interval * 60);
        tracing::info!(
            interval_minutes = self.config.interval,
            "scheduler started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("shutdown requested, stopping scheduler");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    self.cycle().await;
                }
            }
        }
    }

    /// One boost cycle at the current time.
    pub async fn cycle(&mut self) {
        self.cycle_at(Utc::now()).await;
    }

    /// One boost cycle at an explicit reference time. All scoring and
    /// budget decisions within the cycle share this timestamp.
    pub async fn cycle_at(&mut self, now: DateTime<Utc>) {
        tracing::info!("boost cycle starting");
        let mut run = RunState::new();

        if self.config.subscribed_instances.is_empty() && !self.config.local_timeline_enabled {
            tracing::warn!("no subscribed instances configured and local timeline disabled");
            return;
        }

        if !self.budget_available(now) {
            tracing::info!(
                reason = %self.budget_exhausted_reason(),
                "public cap reached, skipping cycle"
            );
            return;
        }

        let mut candidates = self.source.fetch_all(now).await;
        let considered = candidates.len();
        if candidates.is_empty() {
            tracing::info!("no candidates this cycle");
            return;
        }

        for candidate in &mut candidates {
            candidate.raw_score = self.scorer.score(&candidate.status, now);
            if self.config.debug_decisions {
                tracing::debug!(
                    origin = %candidate.origin,
                    uri = %candidate.status.uri,
                    score = candidate.raw_score,
                    "scored candidate"
                );
            }
        }

        // Quality gate on raw scores; a threshold of 0 disables it.
        if self.config.min_score_threshold != 0.0 {
            candidates.retain(|c| {
                let keep = c.raw_score >= self.config.min_score_threshold;
                if !keep && self.config.debug_decisions {
                    tracing::debug!(
                        uri = %c.status.uri,
                        score = c.raw_score,
                        threshold = self.config.min_score_threshold,
                        "dropped below quality threshold"
                    );
                }
                keep
            });
            if candidates.is_empty() {
                tracing::info!(
                    reason = %SkipReason::QualityBelowThreshold,
                    considered,
                    "no candidates met the quality threshold"
                );
                return;
            }
        }

        let raw: Vec<f64> = candidates.iter().map(|c| c.raw_score).collect();
        let normalized = normalize_scores(&raw);
        for (candidate, score) in candidates.iter_mut().zip(normalized) {
            candidate.normalized_score = score;
        }

        // Best first; among equals the newer post wins.
        candidates.sort_by(|a, b| {
            b.normalized_score
                .partial_cmp(&a.normalized_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_created = a.status.created_at.unwrap_or(DateTime::UNIX_EPOCH);
                    let b_created = b.status.created_at.unwrap_or(DateTime::UNIX_EPOCH);
                    b_created.cmp(&a_created)
                })
        });

        let admitted = self.admit(candidates, now, &mut run).await;

        tracing::info!(
            "cycle complete: admitted {}, considered {}, day {}/{}, hour {}/{}",
            admitted,
            considered,
            self.state.day_count(),
            self.config.daily_public_cap,
            self.state.hour_count(),
            self.config.per_hour_public_cap,
        );
    }

    /// Walk the ranked candidates, publishing until a cap closes the run.
    async fn admit(
        &mut self,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
        run: &mut RunState,
    ) -> u32 {
        let mut admitted: u32 = 0;
        let mut per_origin: HashMap<String, u32> = HashMap::new();

        for candidate in &candidates {
            if admitted >= self.config.max_boosts_per_run {
                tracing::info!(reason = %SkipReason::RunCap, "run cap reached, stopping");
                break;
            }
            if !self.budget_available(now) {
                tracing::info!(
                    reason = %self.budget_exhausted_reason(),
                    "public cap reached, stopping"
                );
                break;
            }

            let status = &candidate.status;

            if let Some(reason) = self.diversity.blocked(status, &self.state, run) {
                self.log_skip(candidate, &reason);
                continue;
            }

            let author_host = status.author_host();
            if !author_host.is_empty()
                && self
                    .config
                    .filtered_instances
                    .iter()
                    .any(|h| h == author_host)
            {
                self.log_skip(candidate, &SkipReason::FilteredHost);
                continue;
            }

            if let Some(reason) = self.filter.should_skip(status) {
                self.log_skip(candidate, &reason);
                continue;
            }

            let origin_count = per_origin.get(&candidate.origin).copied().unwrap_or(0);
            let origin_cap = self
                .source_caps
                .get(&candidate.origin)
                .copied()
                .unwrap_or(u32::MAX);
            if origin_count >= origin_cap {
                self.log_skip(candidate, &SkipReason::SourceLimit);
                continue;
            }

            match self.publisher.publish(status, &candidate.origin).await {
                PublishOutcome::Success(stored) => {
                    self.state.consume(now);
                    self.diversity.record(&stored, &mut self.state, run);
                    if let Err(err) = self.state.save(&self.config.state_path) {
                        tracing::error!(%err, "state save failed, continuing");
                    }
                    *per_origin.entry(candidate.origin.clone()).or_insert(0) += 1;
                    admitted += 1;
                    tracing::info!(
                        origin = %candidate.origin,
                        uri = %stored.uri,
                        score = candidate.normalized_score,
                        "boosted"
                    );
                    if self.state.hour_count() >= self.config.per_hour_public_cap {
                        tracing::info!(
                            reason = %SkipReason::HourCap,
                            "hourly cap reached, stopping early"
                        );
                        break;
                    }
                }
                PublishOutcome::Skipped(reason) => {
                    self.log_skip(candidate, &reason);
                }
            }
        }

        admitted
    }

    fn budget_available(&mut self, now: DateTime<Utc>) -> bool {
        self.state.budget_available(
            now,
            self.config.daily_public_cap,
            self.config.per_hour_public_cap,
        )
    }

    /// Which cap closed the budget; checked only after `budget_available`
    /// returned false.
    fn budget_exhausted_reason(&self) -> SkipReason {
        if self.state.hour_count() >= self.config.per_hour_public_cap {
            SkipReason::HourCap
        } else {
            SkipReason::DayCap
        }
    }

    fn log_skip(&self, candidate: &Candidate, reason: &SkipReason) {
        tracing::info!(
            reason = %reason,
            origin = %candidate.origin,
            uri = %candidate.status.uri,
            "skipped"
        );
    }
}
