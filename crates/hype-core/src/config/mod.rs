//! Configuration loading and resolution.
//!
//! Two YAML documents feed the bot: an auth document with the publishing
//! host credentials (required) and a settings document where every key is
//! optional. Each setting also has an environment counterpart named
//! `HYPE_<UPPERCASED_KEY>`. Precedence: environment > settings document >
//! built-in default. Invalid environment values fall back to the next
//! source with a warning.

mod types;

pub use types::{
    AuthDoc, BotAccount, FloatOrBool, HostSubscription, SettingsDoc, SubscriptionForm,
    FETCH_LIMIT_MAX,
};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_account: BotAccount,

    /// Scheduler period in minutes.
    pub interval: u64,
    /// Logging verbosity seed for the subscriber.
    pub log_level: String,
    /// Per-candidate decision traces at DEBUG.
    pub debug_decisions: bool,

    pub subscribed_instances: Vec<HostSubscription>,
    /// Host suffixes whose authors are never boosted.
    pub filtered_instances: Vec<String>,

    pub daily_public_cap: u32,
    pub per_hour_public_cap: u32,
    pub max_boosts_per_run: u32,

    pub max_boosts_per_author_per_day: u32,
    pub author_diversity_enforced: bool,
    pub hashtag_diversity_enforced: bool,
    pub max_boosts_per_hashtag_per_run: u32,

    pub require_media: bool,
    pub skip_sensitive_without_cw: bool,
    pub min_reblogs: u64,
    pub min_favourites: u64,
    pub min_replies: u64,
    pub languages_allowlist: Vec<String>,
    /// Trust the protocol-supplied language field instead of detecting
    /// from content.
    pub use_mastodon_language_detection: bool,

    /// Media bonus weight (bool in the document maps to 0/1).
    pub prefer_media: f64,
    /// Lowercased hashtag name → signed score.
    pub hashtag_scores: HashMap<String, f64>,
    /// Main hashtag → related term → score multiplier. Ordered maps keep
    /// the one-bonus-per-hashtag term scan deterministic.
    pub related_hashtags: BTreeMap<String, BTreeMap<String, f64>>,
    pub spam_emoji_threshold: u32,
    pub spam_emoji_penalty: f64,
    pub spam_link_penalty: f64,
    /// Raw-score cutoff; 0 disables the quality gate.
    pub min_score_threshold: f64,

    pub age_decay_enabled: bool,
    pub age_decay_half_life_hours: f64,

    /// Resolve-and-retry for posts the publishing host does not know.
    pub federate_missing_statuses: bool,

    pub local_timeline_enabled: bool,
    pub local_timeline_fetch_limit: u32,
    pub local_timeline_boost_limit: u32,
    pub local_timeline_min_engagement: u64,

    pub state_path: PathBuf,
    pub secrets_dir: PathBuf,
    pub seen_cache_size: usize,
}

impl Config {
    /// Load and resolve configuration from the two documents plus the
    /// process environment. Fatal on unreadable documents or incomplete
    /// bot-account credentials.
    pub fn load(auth_path: &Path, settings_path: &Path) -> Result<Self, ConfigError> {
        let auth: AuthDoc = read_yaml(auth_path)?;
        let settings: SettingsDoc = read_yaml(settings_path)?;
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("HYPE_"))
            .collect();
        Self::resolve(auth, settings, &env)
    }

    /// Resolve a configuration from already-parsed documents and an
    /// explicit environment map. Split out so tests can pin the
    /// environment without mutating the process.
    pub fn resolve(
        auth: AuthDoc,
        settings: SettingsDoc,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let bot_account = validate_bot_account(auth)?;
        let env = EnvOverrides { vars: env };

        let hashtag_scores = env
            .map_f64("HYPE_HASHTAG_SCORES")
            .or_else(|| settings.hashtag_scores.clone())
            .unwrap_or_else(types::default_hashtag_scores)
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        let related_hashtags = settings
            .related_hashtags
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|(main, terms)| {
                (
                    main.to_lowercase(),
                    terms
                        .into_iter()
                        .map(|(t, m)| (t.to_lowercase(), m))
                        .collect(),
                )
            })
            .collect();

        let languages_allowlist = env
            .list("HYPE_LANGUAGES_ALLOWLIST")
            .or_else(|| settings.languages_allowlist.clone())
            .unwrap_or_else(types::default_languages_allowlist)
            .into_iter()
            .map(|l| l.to_lowercase())
            .collect();

        Ok(Self {
            bot_account,
            interval: env
                .int("HYPE_INTERVAL")
                .or(settings.interval)
                .unwrap_or_else(types::default_interval),
            log_level: env
                .string("HYPE_LOG_LEVEL")
                .or_else(|| settings.log_level.clone())
                .unwrap_or_else(types::default_log_level),
            debug_decisions: env
                .bool("HYPE_DEBUG_DECISIONS")
                .or(settings.debug_decisions)
                .unwrap_or(true),
            subscribed_instances: resolve_subscriptions(&env, &settings),
            filtered_instances: env
                .list("HYPE_FILTERED_INSTANCES")
                .or_else(|| settings.filtered_instances.clone())
                .unwrap_or_else(types::default_filtered_instances),
            daily_public_cap: env
                .int("HYPE_DAILY_PUBLIC_CAP")
                .or(settings.daily_public_cap)
                .unwrap_or_else(types::default_daily_public_cap),
            per_hour_public_cap: env
                .int("HYPE_PER_HOUR_PUBLIC_CAP")
                .or(settings.per_hour_public_cap)
                .unwrap_or_else(types::default_per_hour_public_cap),
            max_boosts_per_run: env
                .int("HYPE_MAX_BOOSTS_PER_RUN")
                .or(settings.max_boosts_per_run)
                .unwrap_or_else(types::default_max_boosts_per_run),
            max_boosts_per_author_per_day: env
                .int("HYPE_MAX_BOOSTS_PER_AUTHOR_PER_DAY")
                .or(settings.max_boosts_per_author_per_day)
                .unwrap_or_else(types::default_max_boosts_per_author_per_day),
            author_diversity_enforced: env
                .bool("HYPE_AUTHOR_DIVERSITY_ENFORCED")
                .or(settings.author_diversity_enforced)
                .unwrap_or(true),
            hashtag_diversity_enforced: env
                .bool("HYPE_HASHTAG_DIVERSITY_ENFORCED")
                .or(settings.hashtag_diversity_enforced)
                .unwrap_or(false),
            max_boosts_per_hashtag_per_run: env
                .int("HYPE_MAX_BOOSTS_PER_HASHTAG_PER_RUN")
                .or(settings.max_boosts_per_hashtag_per_run)
                .unwrap_or_else(types::default_max_boosts_per_hashtag_per_run),
            require_media: env
                .bool("HYPE_REQUIRE_MEDIA")
                .or(settings.require_media)
                .unwrap_or(false),
            skip_sensitive_without_cw: env
                .bool("HYPE_SKIP_SENSITIVE_WITHOUT_CW")
                .or(settings.skip_sensitive_without_cw)
                .unwrap_or(true),
            min_reblogs: env
                .int("HYPE_MIN_REBLOGS")
                .or(settings.min_reblogs)
                .unwrap_or_else(types::default_min_reblogs),
            min_favourites: env
                .int("HYPE_MIN_FAVOURITES")
                .or(settings.min_favourites)
                .unwrap_or_else(types::default_min_favourites),
            min_replies: env
                .int("HYPE_MIN_REPLIES")
                .or(settings.min_replies)
                .unwrap_or(0),
            languages_allowlist,
            use_mastodon_language_detection: env
                .bool("HYPE_USE_MASTODON_LANGUAGE_DETECTION")
                .or(settings.use_mastodon_language_detection)
                .unwrap_or(false),
            prefer_media: env
                .prefer_media("HYPE_PREFER_MEDIA")
                .or_else(|| settings.prefer_media.map(FloatOrBool::as_f64))
                .unwrap_or(0.0),
            hashtag_scores,
            related_hashtags,
            spam_emoji_threshold: env
                .int("HYPE_SPAM_EMOJI_THRESHOLD")
                .or(settings.spam_emoji_threshold)
                .unwrap_or_else(types::default_spam_emoji_threshold),
            spam_emoji_penalty: env
                .float("HYPE_SPAM_EMOJI_PENALTY")
                .or(settings.spam_emoji_penalty)
                .unwrap_or(0.0),
            spam_link_penalty: env
                .float("HYPE_SPAM_LINK_PENALTY")
                .or(settings.spam_link_penalty)
                .unwrap_or(0.0),
            min_score_threshold: env
                .float("HYPE_MIN_SCORE_THRESHOLD")
                .or(settings.min_score_threshold)
                .unwrap_or(0.0),
            age_decay_enabled: env
                .bool("HYPE_AGE_DECAY_ENABLED")
                .or(settings.age_decay_enabled)
                .unwrap_or(false),
            age_decay_half_life_hours: env
                .float("HYPE_AGE_DECAY_HALF_LIFE_HOURS")
                .or(settings.age_decay_half_life_hours)
                .unwrap_or_else(types::default_age_decay_half_life_hours),
            federate_missing_statuses: env
                .bool("HYPE_FEDERATE_MISSING_STATUSES")
                .or(settings.federate_missing_statuses)
                .unwrap_or(false),
            local_timeline_enabled: env
                .bool("HYPE_LOCAL_TIMELINE_ENABLED")
                .or(settings.local_timeline_enabled)
                .unwrap_or(true),
            local_timeline_fetch_limit: env
                .int("HYPE_LOCAL_TIMELINE_FETCH_LIMIT")
                .or(settings.local_timeline_fetch_limit)
                .unwrap_or_else(types::default_local_timeline_fetch_limit),
            local_timeline_boost_limit: env
                .int("HYPE_LOCAL_TIMELINE_BOOST_LIMIT")
                .or(settings.local_timeline_boost_limit)
                .unwrap_or_else(types::default_local_timeline_boost_limit),
            local_timeline_min_engagement: env
                .int("HYPE_LOCAL_TIMELINE_MIN_ENGAGEMENT")
                .or(settings.local_timeline_min_engagement)
                .unwrap_or_else(types::default_local_timeline_min_engagement),
            state_path: PathBuf::from(
                env.string("HYPE_STATE_PATH")
                    .or_else(|| settings.state_path.clone())
                    .unwrap_or_else(types::default_state_path),
            ),
            secrets_dir: PathBuf::from(
                env.string("HYPE_SECRETS_DIR")
                    .or_else(|| settings.secrets_dir.clone())
                    .unwrap_or_else(types::default_secrets_dir),
            ),
            seen_cache_size: env
                .int("HYPE_SEEN_CACHE_SIZE")
                .or(settings.seen_cache_size)
                .unwrap_or_else(types::default_seen_cache_size),
        })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

fn validate_bot_account(auth: AuthDoc) -> Result<BotAccount, ConfigError> {
    let account = auth
        .bot_account
        .ok_or_else(|| ConfigError::IncompleteBotAccount("missing bot_account".to_string()))?;
    let server = account
        .server
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::IncompleteBotAccount("missing server".to_string()))?;
    let access_token = account
        .access_token
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::IncompleteBotAccount("missing access_token".to_string()))?;
    Ok(BotAccount {
        server,
        access_token,
    })
}

fn resolve_subscriptions(env: &EnvOverrides<'_>, settings: &SettingsDoc) -> Vec<HostSubscription> {
    if let Some(raw) = env.vars.get("HYPE_SUBSCRIBED_INSTANCES") {
        // Env grammar is the legacy form: name1=limit1,name2=limit2.
        let mut subs = Vec::new();
        for pair in raw.split(',') {
            let Some((name, limit)) = pair.split_once('=') else {
                continue;
            };
            match limit.trim().parse::<u32>() {
                Ok(limit) => subs.push(HostSubscription::legacy(name.trim(), limit)),
                Err(_) => tracing::warn!(
                    instance = name.trim(),
                    value = limit.trim(),
                    "invalid limit in HYPE_SUBSCRIBED_INSTANCES, skipping entry"
                ),
            }
        }
        return subs;
    }

    let mut subs: Vec<HostSubscription> = settings
        .subscribed_instances
        .as_ref()
        .map(|map| {
            map.iter()
                .map(|(name, form)| HostSubscription::from_form(name, form))
                .collect()
        })
        .unwrap_or_default();
    // Map iteration order is arbitrary; keep fetch order stable across runs.
    subs.sort_by(|a, b| a.name.cmp(&b.name));
    subs
}

/// Typed readers over the `HYPE_*` environment map. Each reader returns
/// `None` (falling through to the document or default) when the variable
/// is absent or unparsable, warning on the latter.
struct EnvOverrides<'a> {
    vars: &'a HashMap<String, String>,
}

impl EnvOverrides<'_> {
    fn string(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(|v| v.trim().to_string())
    }

    fn int<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.vars.get(key)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid integer in environment, using fallback");
                None
            }
        }
    }

    fn float(&self, key: &str) -> Option<f64> {
        let raw = self.vars.get(key)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid float in environment, using fallback");
                None
            }
        }
    }

    fn bool(&self, key: &str) -> Option<bool> {
        let raw = self.vars.get(key)?;
        match parse_bool(raw) {
            Some(v) => Some(v),
            None => {
                tracing::warn!(key, value = %raw, "invalid boolean in environment, using fallback");
                None
            }
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        let raw = self.vars.get(key)?;
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// `k=v,k=v` map with float values; malformed pairs are dropped with a
    /// warning.
    fn map_f64(&self, key: &str) -> Option<HashMap<String, f64>> {
        let raw = self.vars.get(key)?;
        let mut map = HashMap::new();
        for pair in raw.split(',') {
            let Some((k, v)) = pair.split_once('=') else {
                continue;
            };
            match v.trim().parse::<f64>() {
                Ok(score) => {
                    map.insert(k.trim().to_lowercase(), score);
                }
                Err(_) => {
                    tracing::warn!(key, entry = k.trim(), value = v.trim(), "invalid score, skipping entry");
                }
            }
        }
        Some(map)
    }

    /// `prefer_media` accepts boolean forms (→ 0/1) or a float weight.
    fn prefer_media(&self, key: &str) -> Option<f64> {
        let raw = self.vars.get(key)?;
        if let Some(b) = parse_bool(raw) {
            return Some(if b { 1.0 } else { 0.0 });
        }
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid prefer_media in environment, using fallback");
                None
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
