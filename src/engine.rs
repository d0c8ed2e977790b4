//! Build engine collaborator
//!
//! The compiler or bundler itself lives outside this crate. The coordinator
//! only needs one build at a time per configuration and the data the build
//! depended on, so the interface is a single blocking call.

use std::path::PathBuf;

use crate::options::BuildOptions;

/// Result of one build, as reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    /// Epoch millis at which the build began reading its inputs
    ///
    /// `None` means the moment the coordinator invoked the engine.
    pub start_time: Option<i64>,
    /// Files the build read; any later change makes the result stale
    pub file_dependencies: Vec<PathBuf>,
    /// Secondary dependencies, opaque to the cache
    pub dependencies: Vec<serde_json::Value>,
    /// Build payload returned verbatim to callers
    pub stats: serde_json::Value,
}

impl BuildOutput {
    /// Output with no dependencies, started when the engine was invoked
    pub fn new(stats: serde_json::Value) -> Self {
        Self {
            start_time: None,
            file_dependencies: Vec::new(),
            dependencies: Vec::new(),
            stats,
        }
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_file_dependencies(mut self, files: Vec<PathBuf>) -> Self {
        self.file_dependencies = files;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<serde_json::Value>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// External compiler or bundler
///
/// Invoked at most once concurrently per fingerprint. Errors are delivered
/// verbatim to every caller waiting on the build.
pub trait BuildEngine: Send + Sync {
    fn run_build(&self, options: &BuildOptions) -> anyhow::Result<BuildOutput>;
}

impl<F> BuildEngine for F
where
    F: Fn(&BuildOptions) -> anyhow::Result<BuildOutput> + Send + Sync,
{
    fn run_build(&self, options: &BuildOptions) -> anyhow::Result<BuildOutput> {
        self(options)
    }
}
