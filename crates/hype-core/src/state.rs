//! Durable bot state: seen cache, per-author daily tallies, and the
//! day/hour rate counters.
//!
//! The state file is a single JSON document, written after every
//! successful boost via temp-file-and-rename so a crash never leaves a
//! torn file. Loading is tolerant: a missing or malformed file yields a
//! fresh state. Unknown keys in the document are preserved across
//! load/save so older and newer versions can share a state file.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// On-disk schema. Sequences are arrays, mappings are objects, time
/// buckets are string keys.
#[derive(Debug, Default, Deserialize, Serialize)]
struct StateFile {
    #[serde(default)]
    seen_status_ids: Vec<String>,
    #[serde(default)]
    authors_boosted_today: HashMap<String, u32>,
    #[serde(default)]
    day: String,
    #[serde(default)]
    day_count: u32,
    #[serde(default)]
    hour: String,
    #[serde(default)]
    hour_count: u32,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// In-memory bot state. Owned exclusively by the engine; mutated only
/// from the cycle task.
#[derive(Debug)]
pub struct BotState {
    /// FIFO of recently boosted post keys (ids and URIs), bounded.
    seen: VecDeque<String>,
    /// Membership index over `seen`.
    seen_index: HashSet<String>,
    seen_cap: usize,
    authors_today: HashMap<String, u32>,
    day_key: String,
    day_count: u32,
    hour_key: String,
    hour_count: u32,
    /// Unknown document keys, carried through saves untouched.
    extra: serde_json::Map<String, serde_json::Value>,
}

impl BotState {
    /// Fresh state with empty collections.
    pub fn new(seen_cap: usize) -> Self {
        Self {
            seen: VecDeque::new(),
            seen_index: HashSet::new(),
            seen_cap,
            authors_today: HashMap::new(),
            day_key: String::new(),
            day_count: 0,
            hour_key: String::new(),
            hour_count: 0,
            extra: serde_json::Map::new(),
        }
    }

    /// Load from the state file. Missing or malformed files yield a fresh
    /// state rather than an error; the bot must come up regardless.
    pub fn load(path: &Path, seen_cap: usize) -> Self {
        let file = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<StateFile>(&raw) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "state file malformed, starting fresh");
                    StateFile::default()
                }
            },
            Err(_) => StateFile::default(),
        };

        let mut state = Self::new(seen_cap);
        for key in file.seen_status_ids {
            state.push_seen(key);
        }
        state.authors_today = file.authors_boosted_today;
        state.day_key = file.day;
        state.day_count = file.day_count;
        state.hour_key = file.hour;
        state.hour_count = file.hour_count;
        state.extra = file.extra;
        state
    }

    /// Persist to the state file via temp-file-and-rename.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let file = StateFile {
            seen_status_ids: self.seen.iter().cloned().collect(),
            authors_boosted_today: self.authors_today.clone(),
            day: self.day_key.clone(),
            day_count: self.day_count,
            hour: self.hour_key.clone(),
            hour_count: self.hour_count,
            extra: self.extra.clone(),
        };
        let body =
            serde_json::to_string(&file).map_err(|e| StateError::Serialize { source: e })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StateError::Write {
                    path: path.display().to_string(),
                    source: e,
                })?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| StateError::Write {
            path: tmp.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| StateError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    // -- rate budget ---------------------------------------------------

    /// Advance the day/hour buckets for `now`, resetting the counters that
    /// rolled over. Day rollover also clears the author tallies. Keys only
    /// move forward; a backwards clock is a no-op.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let day_key = now.format("%Y-%m-%d").to_string();
        if day_key.as_str() > self.day_key.as_str() {
            self.day_key = day_key;
            self.day_count = 0;
            self.authors_today.clear();
        }
        let hour_key = now.format("%Y-%m-%dT%H").to_string();
        if hour_key.as_str() > self.hour_key.as_str() {
            self.hour_key = hour_key;
            self.hour_count = 0;
        }
    }

    /// Whether both public caps still have room at `now`.
    pub fn budget_available(&mut self, now: DateTime<Utc>, daily_cap: u32, hourly_cap: u32) -> bool {
        self.tick(now);
        self.day_count < daily_cap && self.hour_count < hourly_cap
    }

    /// Count one public boost against both caps. Must be preceded by a
    /// `budget_available` returning true on the same cycle path.
    pub fn consume(&mut self, now: DateTime<Utc>) {
        self.tick(now);
        self.day_count += 1;
        self.hour_count += 1;
    }

    pub fn day_count(&self) -> u32 {
        self.day_count
    }

    pub fn hour_count(&self) -> u32 {
        self.hour_count
    }

    // -- seen cache ----------------------------------------------------

    /// Whether a post key (id or URI) is in the seen cache.
    pub fn seen_contains(&self, key: &str) -> bool {
        self.seen_index.contains(key)
    }

    /// Record a boosted post's id and URI, evicting FIFO past the bound.
    pub fn remember(&mut self, id: &str, uri: &str) {
        self.push_seen(id.to_string());
        self.push_seen(uri.to_string());
    }

    fn push_seen(&mut self, key: String) {
        if key.is_empty() || self.seen_index.contains(&key) {
            return;
        }
        self.seen_index.insert(key.clone());
        self.seen.push_back(key);
        while self.seen.len() > self.seen_cap {
            if let Some(evicted) = self.seen.pop_front() {
                self.seen_index.remove(&evicted);
            }
        }
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    // -- author tallies ------------------------------------------------

    /// How many boosts this author received today.
    pub fn author_count(&self, acct: &str) -> u32 {
        self.authors_today.get(acct).copied().unwrap_or(0)
    }

    /// Count one boost for this author today.
    pub fn count_author(&mut self, acct: &str) {
        *self.authors_today.entry(acct.to_string()).or_insert(0) += 1;
    }
}
