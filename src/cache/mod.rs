//! Staleness-aware result cache
//!
//! One JSON file maps fingerprints to the result of the build that last ran
//! for them. A stored result is served only while the config file and every
//! file the build read are no newer than the build's start time.
//!
//! - `ResultCache` - load/prune/persist and lookups
//! - `CacheTable` - one shared `ResultCache` per file within a process
//! - `CacheEntry` - one stored build result
//! - `freshness` - modification time checks

mod entry;
pub mod freshness;
mod store;
mod table;


pub use entry::{now_millis, CacheEntry};
pub use store::{CacheAuthority, LoadOutcome, ResultCache};
pub use table::{lock_cache, CacheTable, SharedCache};
