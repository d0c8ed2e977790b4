//! Build options and fingerprinting
//!
//! A fingerprint identifies one build configuration. It keys both the
//! coordinator registry and the entry inside the cache file, and names the
//! cache file itself when no explicit path is given.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::{default_cache_dir, Settings};

/// Options describing one build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Primary configuration file of the build
    pub config: PathBuf,
    /// Keep rebuilding on file changes after the first build
    pub watch: bool,
    /// Directory for derived cache files
    pub cache_dir: Option<PathBuf>,
    /// Explicit cache file, overrides `cache_dir`
    pub cache_file: Option<PathBuf>,
    /// Explicit fingerprint, overrides the derived one
    pub build_hash: Option<String>,
    /// Maximum age of cache entries
    pub ttl: Option<Duration>,
}

impl BuildOptions {
    /// Create options for a config file with everything else defaulted
    pub fn new(config: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
            watch: false,
            cache_dir: None,
            cache_file: None,
            build_hash: None,
            ttl: None,
        }
    }

    /// Create options seeded with the cache directory and TTL from settings
    pub fn from_settings(config: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            cache_dir: Some(settings.cache.resolved_dir()),
            ttl: settings.cache.ttl(),
            ..Self::new(config)
        }
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_cache_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(file.into());
        self
    }

    pub fn with_build_hash(mut self, hash: impl Into<String>) -> Self {
        self.build_hash = Some(hash.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Absolute, lexically normalized config path
    pub fn normalized_config(&self) -> PathBuf {
        let absolute = if self.config.is_absolute() {
            self.config.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.config))
                .unwrap_or_else(|_| self.config.clone())
        };
        normalize_path(&absolute)
    }

    /// Identifier of this build configuration
    ///
    /// The explicit `build_hash` when set, otherwise a SHA-256 over the
    /// normalized config path and the watch flag. Cache locations and the TTL
    /// do not take part: they say where results live, not what is built.
    pub fn fingerprint(&self) -> String {
        if let Some(hash) = &self.build_hash {
            return hash.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.normalized_config().to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(if self.watch { b"watch=1" } else { b"watch=0" });
        format!("{:x}", hasher.finalize())
    }

    /// Location of the cache file for this configuration
    pub fn cache_file(&self) -> PathBuf {
        if let Some(file) = &self.cache_file {
            return file.clone();
        }
        self.cache_dir
            .clone()
            .unwrap_or_else(default_cache_dir)
            .join(format!("{}.json", self.fingerprint()))
    }
}

/// Resolve `.` and `..` components without touching the filesystem
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// First six characters of a fingerprint, used to tag log events
pub(crate) fn short_id(fingerprint: &str) -> &str {
    fingerprint.get(..6).unwrap_or(fingerprint)
}
