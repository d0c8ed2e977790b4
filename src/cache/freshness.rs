//! Staleness validation against file modification times

use std::path::Path;

use rayon::prelude::*;

use crate::error::{BuildCacheError, BuildCacheResult};

use super::entry::{system_time_millis, CacheEntry};

/// Modification time of `path` in epoch millis
pub fn modified_millis(path: &Path) -> BuildCacheResult<i64> {
    let metadata = std::fs::metadata(path).map_err(|source| BuildCacheError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = metadata.modified().map_err(|source| BuildCacheError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(system_time_millis(modified))
}

/// Check that neither `config` nor any file dependency changed after the
/// entry's build started.
///
/// Dependencies are stat'ed in parallel. When several are stale, the one
/// listed first in `file_dependencies` is reported.
pub fn validate(entry: &CacheEntry, config: &Path) -> BuildCacheResult<()> {
    let mtime = modified_millis(config)?;
    if mtime > entry.start_time {
        return Err(BuildCacheError::StaleConfig {
            path: config.to_path_buf(),
            start_time: entry.start_time,
            mtime,
        });
    }

    let failure = entry
        .file_dependencies
        .par_iter()
        .find_map_first(|path| match modified_millis(path) {
            Ok(mtime) if mtime > entry.start_time => Some(BuildCacheError::StaleDependency {
                path: path.clone(),
                start_time: entry.start_time,
                mtime,
            }),
            Ok(_) => None,
            Err(e) => Some(e),
        });

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
