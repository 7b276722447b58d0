//! Mastodon API entity types.
//!
//! Every field the engine consumes is tolerant of absence: federated
//! servers routinely omit optional fields or return nulls, and a missing
//! count must read as zero rather than poison the whole timeline page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A post ("status" in protocol terms). Immutable from the engine's
/// perspective; the engine only reads it, scores it, and reblogs it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Status {
    #[serde(default)]
    pub id: String,

    /// Canonical ActivityPub URI — the federation key.
    #[serde(default)]
    pub uri: String,

    /// Display URL on the origin host.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub account: Account,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub reblogs_count: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub favourites_count: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub replies_count: u64,

    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,

    #[serde(default)]
    pub sensitive: bool,

    /// Content-warning text.
    #[serde(default)]
    pub spoiler_text: String,

    /// Server-supplied ISO 639-1 language code, when the server bothered.
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    /// HTML body.
    #[serde(default)]
    pub content: String,

    /// Whether the authenticated account already reblogged this post.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub reblogged: bool,
}

impl Status {
    /// Total interaction count, used by the local-timeline engagement floor.
    pub fn engagement(&self) -> u64 {
        self.reblogs_count + self.favourites_count + self.replies_count
    }

    /// The host suffix of the author handle: `user@host` → `host`,
    /// bare `user` (a local account) → empty string.
    pub fn author_host(&self) -> &str {
        match self.account.acct.rsplit_once('@') {
            Some((_, host)) => host,
            None => "",
        }
    }

    /// Lowercased hashtag names.
    pub fn tag_names(&self) -> impl Iterator<Item = String> + '_ {
        self.tags.iter().map(|t| t.name.to_lowercase())
    }
}

/// The posting account, reduced to what the engine needs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Account {
    /// Handle: `user` for local accounts, `user@host` for remote ones.
    #[serde(default)]
    pub acct: String,
}

/// A hashtag attached to a post.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Tag {
    #[serde(default)]
    pub name: String,
}

/// Media attachment; only its presence matters to the engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MediaAttachment {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Result envelope of `GET /api/v2/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub statuses: Vec<Status>,
}

/// App credentials returned by `POST /api/v1/apps` and persisted per host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Deserialize an engagement count that may arrive as a number, a numeric
/// string, a float, or null. Anything unparsable reads as zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 }))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}

/// Deserialize a boolean that may arrive as true/false or null.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(matches!(value, serde_json::Value::Bool(true)))
}
