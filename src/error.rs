//! Error types for buildcache
//!
//! Uses `thiserror` for library errors. A cache miss is not an error: lookups
//! return `Ok(None)` for absent or malformed entries.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for buildcache operations
pub type BuildCacheResult<T> = Result<T, BuildCacheError>;

/// Main error type for buildcache operations
#[derive(Error, Debug)]
pub enum BuildCacheError {
    /// The primary configuration file changed after the cached build started
    #[error(
        "stale config file: {path}. Compile start time: {start_time}. File mtime: {mtime}"
    )]
    StaleConfig {
        path: PathBuf,
        start_time: i64,
        mtime: i64,
    },

    /// A file the cached build depends on changed after the build started
    #[error(
        "stale file dependency: {path}. Compile start time: {start_time}. File mtime: {mtime}"
    )]
    StaleDependency {
        path: PathBuf,
        start_time: i64,
        mtime: i64,
    },

    /// A file could not be inspected during freshness validation
    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory holding the cache file could not be created
    #[error("failed to create path to cache file: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file could not be written
    #[error("failed to write cache file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache contents could not be serialized
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The build engine reported a failure
    #[error("build failed: {0:#}")]
    Build(anyhow::Error),

    /// The watcher could not be set up
    #[error("failed to watch files: {message}")]
    Watch { message: String },

    /// Invalid settings file
    #[error("invalid settings in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildCacheError {
    /// Whether this error reports an outdated cache entry rather than a failure
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            BuildCacheError::StaleConfig { .. } | BuildCacheError::StaleDependency { .. }
        )
    }
}
