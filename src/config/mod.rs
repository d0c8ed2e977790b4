//! Settings for buildcache
//!
//! Settings hierarchy:
//! 1. Explicit `BuildOptions` fields (highest priority)
//! 2. Environment variables (BUILDCACHE_*)
//! 3. Project settings (`<root>/.buildcache.toml`)
//! 4. User settings (`<config dir>/buildcache/config.toml`)
//! 5. Built-in defaults (lowest priority)

mod loader;
mod types;

pub use loader::{default_cache_dir, ConfigWarning, PROJECT_SETTINGS_FILE};
pub use types::{CacheSettings, Settings, WatchSettings, DEFAULT_DEBOUNCE_MS};
