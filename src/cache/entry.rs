//! Cache entry model

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A previously computed build result
///
/// Serialized with the camelCase keys of the cache file format:
/// `startTime`, `fileDependencies`, `dependencies`, `stats`, `config`,
/// `buildHash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Epoch millis at which the producing build started
    pub start_time: i64,
    /// Files whose modification invalidates this entry
    pub file_dependencies: Vec<PathBuf>,
    /// Opaque secondary dependencies, passed through untouched
    #[serde(default)]
    pub dependencies: Vec<Value>,
    /// Opaque build payload
    pub stats: Value,
    /// Config file of the producing build (diagnostics only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Fingerprint of the producing build (diagnostics only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_hash: Option<String>,
}

impl CacheEntry {
    /// An entry is usable only when it carries a build payload
    pub fn is_usable(&self) -> bool {
        !self.stats.is_null()
    }
}

/// One value of the on-disk map
///
/// Entries that do not match the expected shape are kept verbatim so that
/// persisting the cache does not destroy data this version cannot read, but
/// they are never served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredEntry {
    Valid(Arc<CacheEntry>),
    Malformed(Value),
}

impl StoredEntry {
    pub(crate) fn usable(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            StoredEntry::Valid(entry) if entry.is_usable() => Some(entry),
            _ => None,
        }
    }

    /// Start time used for TTL pruning, if one can be read
    pub(crate) fn start_time(&self) -> Option<i64> {
        match self {
            StoredEntry::Valid(entry) => Some(entry.start_time),
            StoredEntry::Malformed(value) => value.get("startTime").and_then(Value::as_i64),
        }
    }
}

/// Current time in epoch millis
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a filesystem timestamp to epoch millis, saturating at the ends
/// of the `i64` range
pub(crate) fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(i64::MIN),
    }
}
