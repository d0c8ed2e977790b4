//! External collaborators shared by coordinators

use std::fmt;
use std::sync::Arc;

use crate::cache::CacheTable;
use crate::config::Settings;
use crate::diagnostics::DiagnosticSink;
use crate::engine::BuildEngine;
use crate::watcher::{FsWatchSource, WatchSource};

/// The build engine, watch source, open cache files and diagnostic sink a
/// coordinator uses
///
/// Clones share the cache table, so coordinators created from one
/// `Collaborators` never hold two views of the same cache file.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn BuildEngine>,
    pub watcher: Arc<dyn WatchSource>,
    pub caches: Arc<CacheTable>,
    pub sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Collaborators {
    /// Use `engine` with native file watching and no diagnostic sink
    pub fn new(engine: Arc<dyn BuildEngine>) -> Self {
        Self {
            engine,
            watcher: Arc::new(FsWatchSource::default()),
            caches: Arc::new(CacheTable::new()),
            sink: None,
        }
    }

    /// Like `new`, with native file watching debounced per `settings`
    pub fn from_settings(engine: Arc<dyn BuildEngine>, settings: &Settings) -> Self {
        Self::new(engine).with_watcher(Arc::new(FsWatchSource::from_settings(settings)))
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn WatchSource>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("caches", &self.caches.len())
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}
