//! buildcache - build-result cache and request coordinator
//!
//! Sits in front of an expensive build engine (a bundler or compiler) and
//! answers "give me the build result for this configuration":
//! - Results are persisted per configuration fingerprint and served while no
//!   input file changed since the build started
//! - Concurrent requests for the same fingerprint share one build
//! - In watch mode, rebuilds follow file changes and the latest in-memory
//!   result supersedes the persisted one

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod options;
pub mod registry;
pub mod watcher;

// Re-exports for convenience
pub use cache::{CacheAuthority, CacheEntry, CacheTable, LoadOutcome, ResultCache};
pub use config::Settings;
pub use coordinator::{BuildCoordinator, BuildOutcome, BuildState, Collaborators};
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use engine::{BuildEngine, BuildOutput};
pub use error::{BuildCacheError, BuildCacheResult};
pub use options::BuildOptions;
pub use registry::Registry;
pub use watcher::{ChangeStream, FsWatchSource, ManualWatchSource, WatchSource};
