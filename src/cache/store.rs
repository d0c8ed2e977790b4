//! Persistent result cache

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::DiagnosticSink;
use crate::error::{BuildCacheError, BuildCacheResult};

use super::entry::{now_millis, CacheEntry, StoredEntry};
use super::freshness;

/// Whether the persisted cache may be served as the freshest answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheAuthority {
    /// Stored entries are served after staleness validation
    #[default]
    Authoritative,
    /// A live build has superseded the stored data; prefer in-memory results
    Delegating,
}

/// How the backing file was found when the cache was opened
///
/// Every outcome other than `Loaded` is a cold start with an empty map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { entries: usize, pruned: usize },
    Missing,
    Corrupt { reason: String },
}

/// On-disk JSON store of build results keyed by fingerprint
pub struct ResultCache {
    path: PathBuf,
    ttl: Option<Duration>,
    entries: BTreeMap<String, StoredEntry>,
    updated: HashSet<String>,
    authority: CacheAuthority,
    load_outcome: LoadOutcome,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .field("authority", &self.authority)
            .field("load_outcome", &self.load_outcome)
            .finish()
    }
}

impl ResultCache {
    /// Open the cache stored at `path`.
    ///
    /// A missing or unreadable file starts an empty cache. Entries older than
    /// `ttl` are dropped, then the resulting state is written back so the file
    /// on disk always reflects what was loaded. Only that write can fail.
    pub fn open(
        path: impl Into<PathBuf>,
        ttl: Option<Duration>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> BuildCacheResult<Self> {
        let path = path.into();
        let (mut entries, mut load_outcome) = read_entries(&path);

        if let Some(ttl) = ttl {
            let pruned = prune_expired(&mut entries, ttl);
            if let LoadOutcome::Loaded {
                entries: count,
                pruned: pruned_count,
            } = &mut load_outcome
            {
                *count = entries.len();
                *pruned_count = pruned;
            }
        }

        tracing::debug!(path = %path.display(), outcome = ?load_outcome, "opened result cache");

        let cache = Self {
            path,
            ttl,
            entries,
            updated: HashSet::new(),
            authority: CacheAuthority::Authoritative,
            load_outcome,
            sink,
        };

        match &cache.load_outcome {
            LoadOutcome::Loaded { .. } => {
                cache.report(&format!("loaded cache file {}", cache.path.display()))
            }
            LoadOutcome::Corrupt { reason } => cache.report(&format!(
                "ignored unreadable cache file {}: {}",
                cache.path.display(),
                reason
            )),
            LoadOutcome::Missing => {}
        }

        cache.persist()?;
        Ok(cache)
    }

    /// Look up a fresh entry.
    ///
    /// Returns `Ok(None)` when nothing usable is stored under `id`. A stored
    /// entry is returned only if `config` and every file dependency are no
    /// newer than the entry's start time; otherwise the staleness error names
    /// the offending file.
    pub fn get(&self, id: &str, config: &Path) -> BuildCacheResult<Option<Arc<CacheEntry>>> {
        let Some(entry) = self.entries.get(id).and_then(StoredEntry::usable) else {
            return Ok(None);
        };

        freshness::validate(entry, config)?;
        Ok(Some(Arc::clone(entry)))
    }

    /// Stored entry under `id` without any freshness validation
    pub fn peek(&self, id: &str) -> Option<&Arc<CacheEntry>> {
        self.entries.get(id).and_then(StoredEntry::usable)
    }

    /// Store `entry` under `id` and persist.
    ///
    /// With `indicate_change`, the cache stops being authoritative: the entry
    /// came from a live build whose in-memory result should be preferred.
    pub fn set(
        &mut self,
        id: &str,
        entry: Arc<CacheEntry>,
        indicate_change: bool,
    ) -> BuildCacheResult<()> {
        self.entries
            .insert(id.to_string(), StoredEntry::Valid(entry));

        if indicate_change {
            self.updated.insert(id.to_string());
            self.authority = CacheAuthority::Delegating;
        }

        self.persist()
    }

    /// Write the whole map to disk, creating parent directories as needed
    pub fn persist(&self) -> BuildCacheResult<()> {
        let json = serde_json::to_string(&self.entries)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| BuildCacheError::CreateDir {
            path: self.path.clone(),
            source,
        })?;

        let write_err = |source| BuildCacheError::Write {
            path: self.path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        self.report(&format!("updated cache file {}", self.path.display()));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of stored entries, malformed ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a usable entry is stored under `id`
    pub fn contains(&self, id: &str) -> bool {
        self.peek(id).is_some()
    }

    /// Whether `id` was overwritten by a live build during this process
    pub fn was_updated(&self, id: &str) -> bool {
        self.updated.contains(id)
    }

    pub fn authority(&self) -> CacheAuthority {
        self.authority
    }

    /// Authority as seen by one fingerprint
    ///
    /// Fingerprints sharing a file delegate independently: a live build for
    /// one of them says nothing about the freshness of the others.
    pub fn authority_for(&self, id: &str) -> CacheAuthority {
        if self.was_updated(id) {
            CacheAuthority::Delegating
        } else {
            CacheAuthority::Authoritative
        }
    }

    pub fn is_delegating(&self) -> bool {
        self.authority == CacheAuthority::Delegating
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    fn report(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.info(message);
        }
    }
}

fn read_entries(path: &Path) -> (BTreeMap<String, StoredEntry>, LoadOutcome) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (BTreeMap::new(), LoadOutcome::Missing);
        }
        Err(e) => {
            return (
                BTreeMap::new(),
                LoadOutcome::Corrupt {
                    reason: e.to_string(),
                },
            );
        }
    };

    match serde_json::from_str::<BTreeMap<String, StoredEntry>>(&content) {
        Ok(entries) => {
            let count = entries.len();
            (
                entries,
                LoadOutcome::Loaded {
                    entries: count,
                    pruned: 0,
                },
            )
        }
        Err(e) => (
            BTreeMap::new(),
            LoadOutcome::Corrupt {
                reason: e.to_string(),
            },
        ),
    }
}

/// Drop entries that started at or before `now - ttl`; returns how many went
fn prune_expired(entries: &mut BTreeMap<String, StoredEntry>, ttl: Duration) -> usize {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let expiry = now_millis().saturating_sub(ttl_ms);
    let before = entries.len();
    entries.retain(|_, entry| entry.start_time().is_some_and(|start| start > expiry));
    before - entries.len()
}
