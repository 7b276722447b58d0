//! Configuration document structs and their serde default functions.
//!
//! Two YAML documents feed the bot: the auth document (credentials, both
//! fields required) and the settings document (every key optional). The
//! raw structs here mirror the documents; resolution against environment
//! overrides and defaults happens in [`super::Config`].

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// Auth document
// ---------------------------------------------------------------------------

/// Top level of the auth document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthDoc {
    #[serde(default)]
    pub bot_account: Option<BotAccountRaw>,
}

/// Publishing-host credentials as written in the auth document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotAccountRaw {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Validated publishing-host credentials.
#[derive(Debug, Clone)]
pub struct BotAccount {
    /// Host name of the publishing instance.
    pub server: String,
    /// Long-lived access token for the bot account.
    pub access_token: String,
}

// ---------------------------------------------------------------------------
// Settings document
// ---------------------------------------------------------------------------

/// Raw settings document. Every field is optional; `None` falls through to
/// the environment override or the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsDoc {
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub debug_decisions: Option<bool>,
    #[serde(default)]
    pub subscribed_instances: Option<HashMap<String, SubscriptionForm>>,
    #[serde(default)]
    pub filtered_instances: Option<Vec<String>>,
    #[serde(default)]
    pub daily_public_cap: Option<u32>,
    #[serde(default)]
    pub per_hour_public_cap: Option<u32>,
    #[serde(default)]
    pub max_boosts_per_run: Option<u32>,
    #[serde(default)]
    pub max_boosts_per_author_per_day: Option<u32>,
    #[serde(default)]
    pub author_diversity_enforced: Option<bool>,
    #[serde(default)]
    pub hashtag_diversity_enforced: Option<bool>,
    #[serde(default)]
    pub max_boosts_per_hashtag_per_run: Option<u32>,
    #[serde(default)]
    pub prefer_media: Option<FloatOrBool>,
    #[serde(default)]
    pub require_media: Option<bool>,
    #[serde(default)]
    pub skip_sensitive_without_cw: Option<bool>,
    #[serde(default)]
    pub min_reblogs: Option<u64>,
    #[serde(default)]
    pub min_favourites: Option<u64>,
    #[serde(default)]
    pub min_replies: Option<u64>,
    #[serde(default)]
    pub languages_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub use_mastodon_language_detection: Option<bool>,
    #[serde(default)]
    pub hashtag_scores: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub related_hashtags: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    #[serde(default)]
    pub age_decay_enabled: Option<bool>,
    #[serde(default)]
    pub age_decay_half_life_hours: Option<f64>,
    #[serde(default)]
    pub spam_emoji_threshold: Option<u32>,
    #[serde(default)]
    pub spam_emoji_penalty: Option<f64>,
    #[serde(default)]
    pub spam_link_penalty: Option<f64>,
    #[serde(default)]
    pub min_score_threshold: Option<f64>,
    #[serde(default)]
    pub federate_missing_statuses: Option<bool>,
    #[serde(default)]
    pub local_timeline_enabled: Option<bool>,
    #[serde(default)]
    pub local_timeline_fetch_limit: Option<u32>,
    #[serde(default)]
    pub local_timeline_boost_limit: Option<u32>,
    #[serde(default)]
    pub local_timeline_min_engagement: Option<u64>,
    #[serde(default)]
    pub state_path: Option<String>,
    #[serde(default)]
    pub secrets_dir: Option<String>,
    #[serde(default)]
    pub seen_cache_size: Option<usize>,
}

/// A subscription entry: either the composite form with separate fetch and
/// boost limits, or the legacy single-limit form that sets both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionForm {
    Legacy(u32),
    Limits {
        #[serde(default)]
        fetch_limit: Option<u32>,
        #[serde(default)]
        boost_limit: Option<u32>,
        /// Legacy key inside the composite form.
        #[serde(default)]
        limit: Option<u32>,
    },
}

/// `prefer_media` accepts a float weight or a bool (mapped to 0/1).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum FloatOrBool {
    Bool(bool),
    Number(f64),
}

impl FloatOrBool {
    pub fn as_f64(self) -> f64 {
        match self {
            FloatOrBool::Bool(true) => 1.0,
            FloatOrBool::Bool(false) => 0.0,
            FloatOrBool::Number(n) => n,
        }
    }
}

// ---------------------------------------------------------------------------
// Host subscriptions
// ---------------------------------------------------------------------------

/// A remote host to poll for trending posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSubscription {
    /// DNS name of the host.
    pub name: String,
    /// How many trending posts to request, clamped to the API maximum.
    pub fetch_limit: u32,
    /// Max admissions this host may contribute per run.
    pub boost_limit: u32,
}

/// The trending API never returns more than this many statuses.
pub const FETCH_LIMIT_MAX: u32 = 20;

const DEFAULT_FETCH_LIMIT: u32 = 20;
const DEFAULT_BOOST_LIMIT: u32 = 4;

impl HostSubscription {
    /// Composite form with separate limits. Missing limits take defaults;
    /// out-of-range values are clamped.
    pub fn new(name: &str, fetch_limit: Option<u32>, boost_limit: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            fetch_limit: fetch_limit
                .unwrap_or(DEFAULT_FETCH_LIMIT)
                .clamp(1, FETCH_LIMIT_MAX),
            boost_limit: boost_limit.unwrap_or(DEFAULT_BOOST_LIMIT).max(1),
        }
    }

    /// Legacy single-limit form: one number sets both limits.
    pub fn legacy(name: &str, limit: u32) -> Self {
        let clamped = limit.clamp(1, FETCH_LIMIT_MAX);
        Self {
            name: name.to_string(),
            fetch_limit: clamped,
            boost_limit: clamped,
        }
    }

    pub(super) fn from_form(name: &str, form: &SubscriptionForm) -> Self {
        match form {
            SubscriptionForm::Legacy(limit) => Self::legacy(name, *limit),
            SubscriptionForm::Limits {
                fetch_limit,
                boost_limit,
                limit,
            } => match (fetch_limit, boost_limit, limit) {
                // Composite form with only the legacy key behaves like the
                // legacy scalar form.
                (None, None, Some(l)) => Self::legacy(name, *l),
                _ => Self::new(name, *fetch_limit, *boost_limit),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in defaults
// ---------------------------------------------------------------------------

pub(super) fn default_interval() -> u64 {
    15
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_filtered_instances() -> Vec<String> {
    vec!["example.com".to_string()]
}
pub(super) fn default_daily_public_cap() -> u32 {
    96
}
pub(super) fn default_per_hour_public_cap() -> u32 {
    5
}
pub(super) fn default_max_boosts_per_run() -> u32 {
    5
}
pub(super) fn default_max_boosts_per_author_per_day() -> u32 {
    1
}
pub(super) fn default_min_reblogs() -> u64 {
    10
}
pub(super) fn default_min_favourites() -> u64 {
    10
}
pub(super) fn default_languages_allowlist() -> Vec<String> {
    vec!["en".to_string()]
}
pub(super) fn default_hashtag_scores() -> HashMap<String, f64> {
    [
        ("homelab", 20.0),
        ("selfhosted", 15.0),
        ("privacy", 10.0),
        ("security", 10.0),
        ("cybersecurity", 10.0),
        ("kubernetes", 15.0),
        ("docker", 15.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
pub(super) fn default_age_decay_half_life_hours() -> f64 {
    24.0
}
pub(super) fn default_max_boosts_per_hashtag_per_run() -> u32 {
    1
}
pub(super) fn default_spam_emoji_threshold() -> u32 {
    2
}
pub(super) fn default_local_timeline_fetch_limit() -> u32 {
    20
}
pub(super) fn default_local_timeline_boost_limit() -> u32 {
    2
}
pub(super) fn default_local_timeline_min_engagement() -> u64 {
    1
}
pub(super) fn default_state_path() -> String {
    "secrets/state.json".to_string()
}
pub(super) fn default_secrets_dir() -> String {
    "secrets".to_string()
}
pub(super) fn default_seen_cache_size() -> usize {
    6000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_form_sets_both_limits() {
        let sub = HostSubscription::legacy("mastodon.social", 7);
        assert_eq!(sub.fetch_limit, 7);
        assert_eq!(sub.boost_limit, 7);
    }

    #[test]
    fn legacy_form_clamps_to_api_maximum() {
        let sub = HostSubscription::legacy("mastodon.social", 50);
        assert_eq!(sub.fetch_limit, 20);
        assert_eq!(sub.boost_limit, 20);

        let sub = HostSubscription::legacy("mastodon.social", 0);
        assert_eq!(sub.fetch_limit, 1);
    }

    #[test]
    fn composite_form_defaults() {
        let sub = HostSubscription::new("fosstodon.org", None, None);
        assert_eq!(sub.fetch_limit, 20);
        assert_eq!(sub.boost_limit, 4);
    }

    #[test]
    fn composite_form_clamps_fetch_but_not_boost() {
        let sub = HostSubscription::new("fosstodon.org", Some(99), Some(30));
        assert_eq!(sub.fetch_limit, 20);
        assert_eq!(sub.boost_limit, 30);

        let sub = HostSubscription::new("fosstodon.org", Some(3), Some(0));
        assert_eq!(sub.fetch_limit, 3);
        assert_eq!(sub.boost_limit, 1);
    }

    #[test]
    fn from_form_composite_with_only_legacy_key() {
        let form = SubscriptionForm::Limits {
            fetch_limit: None,
            boost_limit: None,
            limit: Some(6),
        };
        let sub = HostSubscription::from_form("mas.to", &form);
        assert_eq!(sub.fetch_limit, 6);
        assert_eq!(sub.boost_limit, 6);
    }

    #[test]
    fn settings_doc_parses_both_subscription_forms() {
        let doc: SettingsDoc = serde_yaml::from_str(
            r#"
subscribed_instances:
  infosec.exchange:
    fetch_limit: 15
    boost_limit: 5
  mastodon.social: 4
"#,
        )
        .expect("yaml");
        let map = doc.subscribed_instances.expect("instances");
        let infosec = HostSubscription::from_form(
            "infosec.exchange",
            map.get("infosec.exchange").unwrap(),
        );
        assert_eq!(infosec.fetch_limit, 15);
        assert_eq!(infosec.boost_limit, 5);

        let social =
            HostSubscription::from_form("mastodon.social", map.get("mastodon.social").unwrap());
        assert_eq!(social.fetch_limit, 4);
        assert_eq!(social.boost_limit, 4);
    }

    #[test]
    fn prefer_media_accepts_bool_and_float() {
        assert_eq!(FloatOrBool::Bool(true).as_f64(), 1.0);
        assert_eq!(FloatOrBool::Bool(false).as_f64(), 0.0);
        assert_eq!(FloatOrBool::Number(0.5).as_f64(), 0.5);
    }
}
