//! Process-wide table of open cache files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::diagnostics::DiagnosticSink;
use crate::error::BuildCacheResult;
use crate::options::normalize_path;

use super::store::ResultCache;

/// A cache file shared by every coordinator that stores results in it
pub type SharedCache = Arc<Mutex<ResultCache>>;

/// Open caches keyed by file path
///
/// Several fingerprints may store into one file. They must go through one
/// `ResultCache`, otherwise each persist would replace the whole file with
/// its own view and drop the other fingerprints' entries.
#[derive(Debug, Default)]
pub struct CacheTable {
    caches: Mutex<HashMap<PathBuf, SharedCache>>,
}

impl CacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache for `path`, opened on first use.
    ///
    /// The TTL and sink of the first opener apply to the file.
    pub fn open(
        &self,
        path: &Path,
        ttl: Option<Duration>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> BuildCacheResult<SharedCache> {
        let key = table_key(path);
        let mut caches = self.lock();
        if let Some(cache) = caches.get(&key) {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(Mutex::new(ResultCache::open(path, ttl, sink)?));
        caches.insert(key, Arc::clone(&cache));
        Ok(cache)
    }

    pub fn get(&self, path: &Path) -> Option<SharedCache> {
        self.lock().get(&table_key(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every open cache. Files on disk are left alone.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedCache>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock a shared cache, recovering from a panicked holder
pub fn lock_cache(cache: &SharedCache) -> MutexGuard<'_, ResultCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn table_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_path(&absolute)
}
