//! Composite post scoring: hashtag weights, related-term bonuses,
//! engagement, media preference, spam penalties, and age decay.
//!
//! `score` is deterministic and side-effect-free: the same post, config,
//! and reference time always produce the same value. The engine evaluates
//! one reference time per cycle so candidates within a run are comparable.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::Config;
use crate::mastodon::Status;

/// Engagement term weights. Reblogs signal reach, replies signal
/// conversation; both outweigh favourites.
const REBLOG_WEIGHT: f64 = 2.0;
const FAVOURITE_WEIGHT: f64 = 1.0;
const REPLY_WEIGHT: f64 = 1.5;

/// Scoring engine compiled once from config.
pub struct ScoringEngine {
    hashtag_scores: HashMap<String, f64>,
    related_hashtags: BTreeMap<String, BTreeMap<String, f64>>,
    prefer_media: f64,
    spam_emoji_threshold: u32,
    spam_emoji_penalty: f64,
    spam_link_penalty: f64,
    age_decay_enabled: bool,
    age_decay_half_life_hours: f64,
    link_pattern: Regex,
}

impl ScoringEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            hashtag_scores: config.hashtag_scores.clone(),
            related_hashtags: config.related_hashtags.clone(),
            prefer_media: config.prefer_media,
            spam_emoji_threshold: config.spam_emoji_threshold,
            spam_emoji_penalty: config.spam_emoji_penalty,
            spam_link_penalty: config.spam_link_penalty,
            age_decay_enabled: config.age_decay_enabled,
            age_decay_half_life_hours: config.age_decay_half_life_hours,
            link_pattern: Regex::new(r"(?i)https?://\S+|(?:^|\s)www\.\S+")
                .expect("link pattern is valid"),
        }
    }

    /// Raw score for a post at reference time `now`. May be negative.
    pub fn score(&self, status: &Status, now: DateTime<Utc>) -> f64 {
        let mut base = 0.0;

        for tag in status.tag_names() {
            if let Some(weight) = self.hashtag_scores.get(&tag) {
                base += weight;
            }
        }

        base += self.related_bonus(status);

        base += REBLOG_WEIGHT * (status.reblogs_count as f64).ln_1p()
            + FAVOURITE_WEIGHT * (status.favourites_count as f64).ln_1p()
            + REPLY_WEIGHT * (status.replies_count as f64).ln_1p();

        if !status.media_attachments.is_empty() {
            base += self.prefer_media;
        }

        base -= self.spam_penalty(&status.content);

        if self.age_decay_enabled {
            base *= self.age_decay_factor(status.created_at, now);
        }

        base
    }

    /// Bonus for posts discussing a scored topic without carrying its
    /// hashtag. At most one bonus per configured main hashtag; terms are
    /// scanned in sorted order so the first hit is deterministic. Negative
    /// base scores never produce a bonus.
    fn related_bonus(&self, status: &Status) -> f64 {
        if self.related_hashtags.is_empty() {
            return 0.0;
        }

        let tags: Vec<String> = status.tag_names().collect();
        let mut haystack = status.content.to_lowercase();
        for tag in &tags {
            haystack.push(' ');
            haystack.push_str(tag);
        }

        let mut bonus = 0.0;
        for (main, terms) in &self.related_hashtags {
            let base = self.hashtag_scores.get(main).copied().unwrap_or(0.0);
            if base <= 0.0 || tags.iter().any(|t| t == main) {
                continue;
            }
            for (term, multiplier) in terms {
                if haystack.contains(term.as_str()) {
                    bonus += base * multiplier;
                    break;
                }
            }
        }
        bonus
    }

    fn spam_penalty(&self, content: &str) -> f64 {
        let mut penalty = 0.0;
        if self.spam_emoji_penalty != 0.0 {
            let emojis = count_emojis(content);
            if emojis > self.spam_emoji_threshold {
                penalty += (emojis - self.spam_emoji_threshold) as f64 * self.spam_emoji_penalty;
            }
        }
        if self.spam_link_penalty != 0.0 && self.link_pattern.is_match(content) {
            penalty += self.spam_link_penalty;
        }
        penalty
    }

    /// Multiplicative decay factor: 0.5^(age_hours / half_life). A post
    /// with no timestamp reads as epoch-old and decays to ~0. Negative
    /// ages (clock skew) do not boost.
    fn age_decay_factor(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        if self.age_decay_half_life_hours <= 0.0 {
            return 1.0;
        }
        let created = created_at.unwrap_or(DateTime::UNIX_EPOCH);
        let age_hours = (now - created).num_seconds() as f64 / 3600.0;
        if age_hours <= 0.0 {
            return 1.0;
        }
        0.5_f64.powf(age_hours / self.age_decay_half_life_hours)
    }
}

/// Count emoji codepoints in the standard ranges: emoticons, misc symbols
/// and pictographs, transport, regional-indicator flags, and dingbats.
pub fn count_emojis(content: &str) -> u32 {
    content
        .chars()
        .filter(|c| {
            matches!(
                *c as u32,
                0x1F600..=0x1F64F // emoticons
                | 0x1F300..=0x1F5FF // misc symbols and pictographs
                | 0x1F680..=0x1F6FF // transport and map symbols
                | 0x1F1E6..=0x1F1FF // regional indicators (flags)
                | 0x2700..=0x27BF // dingbats
            )
        })
        .count() as u32
}

/// Map raw scores linearly onto [0, 100]. When all scores are equal the
/// whole field normalizes to 100.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let Some(min) = raw.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = raw.iter().copied().reduce(f64::max).unwrap_or(min);
    if (max - min).abs() < f64::EPSILON {
        return vec![100.0; raw.len()];
    }
    raw.iter().map(|s| (s - min) / (max - min) * 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthDoc, SettingsDoc};
    use crate::mastodon::{MediaAttachment, Tag};
    use chrono::Duration;

    fn config_with(settings_yaml: &str) -> Config {
        let auth: AuthDoc =
            serde_yaml::from_str("bot_account:\n  server: s\n  access_token: t\n").unwrap();
        let mut settings: SettingsDoc = if settings_yaml.trim().is_empty() {
            SettingsDoc::default()
        } else {
            serde_yaml::from_str(settings_yaml).unwrap()
        };
        // Scorer tests never want the built-in hashtag table unless the
        // test sets its own.
        if settings.hashtag_scores.is_none() {
            settings.hashtag_scores = Some(HashMap::new());
        }
        Config::resolve(auth, settings, &HashMap::new()).unwrap()
    }

    fn engine(settings_yaml: &str) -> ScoringEngine {
        ScoringEngine::new(&config_with(settings_yaml))
    }

    fn status() -> Status {
        Status {
            id: "1".to_string(),
            uri: "https://a/1".to_string(),
            created_at: Some(Utc::now()),
            ..Status::default()
        }
    }

    fn tagged(names: &[&str]) -> Vec<Tag> {
        names
            .iter()
            .map(|n| Tag {
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn scores_hashtags_and_engagement() {
        let engine = engine("hashtag_scores:\n  python: 10\n");
        let mut s = status();
        s.tags = tagged(&["python"]);
        s.reblogs_count = 3;
        s.favourites_count = 8;

        let expected = 10.0 + 3.0_f64.ln_1p() * 2.0 + 8.0_f64.ln_1p();
        assert!((engine.score(&s, Utc::now()) - expected).abs() < 1e-9);
    }

    #[test]
    fn replies_weighted_between_favourites_and_reblogs() {
        let engine = engine("");
        let mut s = status();
        s.replies_count = 4;
        let expected = 1.5 * 4.0_f64.ln_1p();
        assert!((engine.score(&s, Utc::now()) - expected).abs() < 1e-9);
    }

    #[test]
    fn media_bonus_only_with_preference() {
        let mut s = status();
        s.media_attachments = vec![MediaAttachment::default()];

        let engine_with_pref = engine("prefer_media: 0.5\n");
        assert!((engine_with_pref.score(&s, Utc::now()) - 0.5).abs() < 1e-9);

        let engine_without_pref = engine("");
        assert_eq!(engine_without_pref.score(&s, Utc::now()), 0.0);
    }

    #[test]
    fn emoji_counting() {
        assert_eq!(count_emojis(""), 0);
        assert_eq!(count_emojis("Hello world"), 0);
        assert_eq!(count_emojis("Hello 😀"), 1);
        assert_eq!(count_emojis("😀😁😂"), 3);
        assert_eq!(count_emojis("Check this out! 🎉🎊🚀 Amazing!"), 3);
    }

    #[test]
    fn emoji_penalty_applies_over_threshold() {
        let engine = engine("spam_emoji_penalty: 1.0\nspam_emoji_threshold: 2\n");
        let mut s = status();

        s.content = "😀😁".to_string();
        assert_eq!(engine.score(&s, Utc::now()), 0.0);

        s.content = "😀😁😂".to_string();
        assert!((engine.score(&s, Utc::now()) + 1.0).abs() < 1e-9);

        s.content = "😀😁😂😃😄".to_string();
        assert!((engine.score(&s, Utc::now()) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn link_penalty() {
        let engine = engine("spam_link_penalty: 0.5\n");
        let mut s = status();

        s.content = "Hello world".to_string();
        assert_eq!(engine.score(&s, Utc::now()), 0.0);

        s.content = "Check out https://example.com".to_string();
        assert!((engine.score(&s, Utc::now()) + 0.5).abs() < 1e-9);

        s.content = "Visit www.example.com".to_string();
        assert!((engine.score(&s, Utc::now()) + 0.5).abs() < 1e-9);
    }

    #[test]
    fn combined_spam_penalties() {
        let engine = engine(
            "spam_emoji_penalty: 1.0\nspam_emoji_threshold: 2\nspam_link_penalty: 0.5\n",
        );
        let mut s = status();
        s.content = "😀😁😂😃 Check this out! https://example.com".to_string();
        assert!((engine.score(&s, Utc::now()) + 2.5).abs() < 1e-9);
    }

    #[test]
    fn penalties_disabled_by_default() {
        let engine = engine("");
        let mut s = status();
        s.content = "😀😁😂😃😄 Check out https://example.com".to_string();
        assert_eq!(engine.score(&s, Utc::now()), 0.0);
    }

    #[test]
    fn related_bonus_for_matching_content() {
        let engine = engine(
            r#"
hashtag_scores:
  homelab: 10.0
related_hashtags:
  homelab:
    self-hosting: 0.5
"#,
        );
        let mut s = status();
        s.content = "I love Self-Hosting my applications".to_string();
        assert!((engine.score(&s, Utc::now()) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn related_bonus_skipped_when_main_tag_present() {
        let engine = engine(
            r#"
hashtag_scores:
  homelab: 10.0
related_hashtags:
  homelab:
    self-hosting: 0.5
"#,
        );
        let mut s = status();
        s.content = "I love self-hosting".to_string();
        s.tags = tagged(&["homelab"]);
        // Main hashtag score applies, but no related bonus on top.
        assert!((engine.score(&s, Utc::now()) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn related_bonus_matches_tag_names_too() {
        let engine = engine(
            r#"
hashtag_scores:
  homelab: 10.0
related_hashtags:
  homelab:
    selfhosted: 0.5
"#,
        );
        let mut s = status();
        s.content = "Check out my setup".to_string();
        s.tags = tagged(&["selfhosted"]);
        assert!((engine.score(&s, Utc::now()) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn related_bonus_once_per_main_hashtag_in_sorted_term_order() {
        let engine = engine(
            r#"
hashtag_scores:
  homelab: 10.0
related_hashtags:
  homelab:
    self-hosting: 0.5
    self-hosted: 0.3
"#,
        );
        let mut s = status();
        s.content = "I love self-hosting and self-hosted applications".to_string();
        // Terms scan in sorted order: "self-hosted" hits first, 10 * 0.3.
        assert!((engine.score(&s, Utc::now()) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn related_bonus_sums_across_main_hashtags() {
        let engine = engine(
            r#"
hashtag_scores:
  homelab: 10.0
  docker: 8.0
related_hashtags:
  homelab:
    self-hosting: 0.5
  docker:
    container: 0.6
"#,
        );
        let mut s = status();
        s.content = "I use containers for self-hosting in my setup".to_string();
        assert!((engine.score(&s, Utc::now()) - 9.8).abs() < 1e-9);
    }

    #[test]
    fn no_related_bonus_for_negative_base_scores() {
        let engine = engine(
            r#"
hashtag_scores:
  spam: -10.0
related_hashtags:
  spam:
    advertisement: 0.5
"#,
        );
        let mut s = status();
        s.content = "This is an advertisement".to_string();
        assert_eq!(engine.score(&s, Utc::now()), 0.0);
    }

    #[test]
    fn age_decay_disabled_by_default() {
        let engine = engine("hashtag_scores:\n  test: 10\n");
        let mut s = status();
        s.tags = tagged(&["test"]);
        s.created_at = Some(Utc::now() - Duration::hours(48));
        assert!((engine.score(&s, Utc::now()) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn age_decay_two_half_lives_quarters_the_score() {
        let engine = engine(
            "hashtag_scores:\n  test: 10\nage_decay_enabled: true\nage_decay_half_life_hours: 24.0\n",
        );
        let now = Utc::now();
        let mut s = status();
        s.tags = tagged(&["test"]);
        s.created_at = Some(now - Duration::hours(48));
        assert!((engine.score(&s, now) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn age_decay_zero_age_is_identity() {
        let engine = engine(
            "hashtag_scores:\n  test: 10\nage_decay_enabled: true\nage_decay_half_life_hours: 24.0\n",
        );
        let now = Utc::now();
        let mut s = status();
        s.tags = tagged(&["test"]);
        s.created_at = Some(now);
        assert!((engine.score(&s, now) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn age_decay_missing_created_at_reads_as_epoch() {
        let engine = engine(
            "hashtag_scores:\n  test: 10\nage_decay_enabled: true\nage_decay_half_life_hours: 24.0\n",
        );
        let mut s = status();
        s.tags = tagged(&["test"]);
        s.created_at = None;
        let score = engine.score(&s, Utc::now());
        assert!(score >= 0.0 && score < 1.0);
    }

    #[test]
    fn age_decay_shrinks_negative_scores_toward_zero() {
        let engine = engine(
            "hashtag_scores:\n  bad: -10\nage_decay_enabled: true\nage_decay_half_life_hours: 24.0\n",
        );
        let now = Utc::now();
        let mut s = status();
        s.tags = tagged(&["bad"]);
        s.created_at = Some(now - Duration::hours(24));
        assert!((engine.score(&s, now) - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn score_is_deterministic() {
        let engine = engine("hashtag_scores:\n  python: 7\n");
        let now = Utc::now();
        let mut s = status();
        s.tags = tagged(&["python"]);
        s.reblogs_count = 11;
        let a = engine.score(&s, now);
        let b = engine.score(&s, now);
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_maps_to_unit_range() {
        let normalized = normalize_scores(&[5.0, 15.0, 10.0]);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[1], 100.0);
        assert_eq!(normalized[2], 50.0);
    }

    #[test]
    fn normalize_all_equal_yields_hundred() {
        let normalized = normalize_scores(&[3.0, 3.0, 3.0]);
        assert_eq!(normalized, vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn normalize_empty_input() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn normalize_bounds_hold_for_mixed_signs() {
        let normalized = normalize_scores(&[-10.0, 0.0, 30.0]);
        assert!(normalized.iter().all(|s| (0.0..=100.0).contains(s)));
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[2], 100.0);
    }
}
