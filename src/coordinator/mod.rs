//! Build coordinator
//!
//! One coordinator exists per build fingerprint. It decides for every request
//! whether to serve the persisted cache, wait for the build already in
//! flight, or start a build, so that at most one build per fingerprint runs
//! at any time.
//!
//! Deduplication is a waiter queue: requests arriving while a build runs are
//! queued and all receive the outcome of that build, in arrival order. The
//! lock is held only to make that decision and is never held across a build
//! or while callbacks run, so a callback may issue further requests.
//!
//! In watch mode the first completed build turns the cache from
//! `Authoritative` into `Delegating`; from then on requests are answered from
//! the latest in-memory result instead of re-validating the file on disk.

mod collaborators;
mod state;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use anyhow::anyhow;

use crate::cache::{freshness, lock_cache, now_millis, CacheAuthority, CacheEntry, SharedCache};
use crate::engine::BuildOutput;
use crate::error::{BuildCacheError, BuildCacheResult};
use crate::options::{short_id, BuildOptions};
use crate::watcher::ChangeStream;

pub use collaborators::Collaborators;
pub use state::{BuildOutcome, BuildState};

use state::{Callback, Decision};

#[derive(Default)]
struct Inner {
    cache: Option<SharedCache>,
    state: BuildState,
    pending: Vec<Callback>,
    once_done: Vec<Callback>,
    last_result: Option<Arc<CacheEntry>>,
    watching: bool,
}

/// Serves build requests for one build configuration
pub struct BuildCoordinator {
    options: BuildOptions,
    fingerprint: String,
    collaborators: Collaborators,
    inner: Mutex<Inner>,
}

impl fmt::Debug for BuildCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("BuildCoordinator")
            .field("fingerprint", &self.fingerprint)
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .field("watching", &inner.watching)
            .finish_non_exhaustive()
    }
}

impl BuildCoordinator {
    pub fn new(options: BuildOptions, collaborators: Collaborators) -> Arc<Self> {
        let fingerprint = options.fingerprint();
        Arc::new(Self {
            options,
            fingerprint,
            collaborators,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Ask for a build result.
    ///
    /// `callback` runs exactly once: immediately on the calling thread when a
    /// result can be served right away, otherwise on the build thread when the
    /// build it waits for settles.
    pub fn request<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce(BuildOutcome) + Send + 'static,
    {
        let mut inner = self.lock();
        match self.decide(&mut inner) {
            Decision::Deliver(entry) => {
                drop(inner);
                callback(Ok(entry));
            }
            Decision::DeliverAndWatch(entry) => {
                drop(inner);
                self.spawn_watch();
                callback(Ok(entry));
            }
            Decision::Wait => inner.pending.push(Box::new(callback)),
            Decision::Build => {
                inner.pending.push(Box::new(callback));
                drop(inner);
                self.spawn_build();
            }
            Decision::Watch => {
                inner.pending.push(Box::new(callback));
                drop(inner);
                self.spawn_watch();
            }
            Decision::Fail(e) => {
                drop(inner);
                callback(Err(e));
            }
        }
    }

    /// Like `request`, blocking the calling thread until the outcome is known
    pub fn build_blocking(self: &Arc<Self>) -> BuildOutcome {
        let (tx, rx) = mpsc::channel();
        self.request(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.recv().unwrap_or_else(|_| {
            Err(Arc::new(BuildCacheError::Build(anyhow!(
                "build was abandoned before completing"
            ))))
        })
    }

    /// Run `callback` when the next build settles.
    ///
    /// Results delivered before registration never satisfy it; it observes
    /// the next transition only.
    pub fn once_done<F>(&self, callback: F)
    where
        F: FnOnce(BuildOutcome) + Send + 'static,
    {
        self.lock().once_done.push(Box::new(callback));
    }

    /// Options of the first request that created this coordinator
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn state(&self) -> BuildState {
        self.lock().state
    }

    /// Whether the persisted cache is still trusted for this fingerprint
    pub fn authority(&self) -> CacheAuthority {
        self.lock()
            .cache
            .as_ref()
            .map(|cache| lock_cache(cache).authority_for(&self.fingerprint))
            .unwrap_or_default()
    }

    /// Most recent result delivered to any caller
    pub fn last_result(&self) -> Option<Arc<CacheEntry>> {
        self.lock().last_result.clone()
    }

    /// Entry currently stored in the cache, without validation
    pub fn cached_entry(&self) -> Option<Arc<CacheEntry>> {
        self.lock()
            .cache
            .as_ref()
            .and_then(|cache| lock_cache(cache).peek(&self.fingerprint).cloned())
    }

    /// Number of requests waiting for the in-flight build
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_watching(&self) -> bool {
        self.lock().watching
    }

    pub fn cache_path(&self) -> PathBuf {
        self.options.cache_file()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id(&self) -> &str {
        short_id(&self.fingerprint)
    }

    /// The cache file for this fingerprint, shared through the cache table
    fn open_cache(&self, inner: &mut Inner) -> BuildCacheResult<SharedCache> {
        if let Some(cache) = &inner.cache {
            return Ok(Arc::clone(cache));
        }
        let cache = self.collaborators.caches.open(
            &self.options.cache_file(),
            self.options.ttl,
            self.collaborators.sink.clone(),
        )?;
        inner.cache = Some(Arc::clone(&cache));
        Ok(cache)
    }

    fn decide(&self, inner: &mut Inner) -> Decision {
        let shared = match self.open_cache(inner) {
            Ok(cache) => cache,
            Err(e) => return Decision::Fail(Arc::new(e)),
        };

        if inner.state == BuildState::Running {
            tracing::debug!(id = self.id(), "build in flight, queueing request");
            return Decision::Wait;
        }

        let cache = lock_cache(&shared);
        match cache.authority_for(&self.fingerprint) {
            CacheAuthority::Delegating => {
                if let Some(result) = &inner.last_result {
                    return Decision::Deliver(Arc::clone(result));
                }
                if inner.watching {
                    return Decision::Wait;
                }
                self.start(inner)
            }
            CacheAuthority::Authoritative => {
                match cache.get(&self.fingerprint, &self.options.config) {
                    Ok(Some(entry)) => {
                        tracing::debug!(id = self.id(), "serving cached result");
                        inner.state = BuildState::Cached;
                        inner.last_result = Some(Arc::clone(&entry));
                        if self.options.watch && !inner.watching {
                            inner.watching = true;
                            Decision::DeliverAndWatch(entry)
                        } else {
                            Decision::Deliver(entry)
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(id = self.id(), "no cached result");
                        self.start(inner)
                    }
                    Err(e) => {
                        tracing::debug!(id = self.id(), error = %e, "cached result unusable");
                        self.start(inner)
                    }
                }
            }
        }
    }

    fn start(&self, inner: &mut Inner) -> Decision {
        inner.state = BuildState::Running;
        if !self.options.watch {
            return Decision::Build;
        }
        if inner.watching {
            Decision::Wait
        } else {
            inner.watching = true;
            Decision::Watch
        }
    }

    fn spawn_build(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("build-{}", self.id()))
            .spawn(move || {
                let result = this.run_engine();
                let _ = this.complete(result, false);
            });

        if let Err(e) = spawned {
            let _ = self.complete(
                Err(anyhow::Error::new(e).context("failed to spawn build thread")),
                false,
            );
        }
    }

    fn spawn_watch(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("watch-{}", self.id()))
            .spawn(move || this.watch_loop());

        if let Err(e) = spawned {
            self.lock().watching = false;
            let _ = self.complete(
                Err(anyhow::Error::new(e).context("failed to spawn watch thread")),
                true,
            );
        }
    }

    /// Build, publish, wait for the inputs to change, repeat.
    ///
    /// The change stream lives across builds, so edits made while a build
    /// runs are reported once it finishes. When the watched set changes the
    /// stream is replaced and the new result is re-validated, since edits
    /// between the build start and the new subscription are not reported.
    ///
    /// Ends when the watch source closes, unless requests are still waiting
    /// for a result, in which case one more build runs for them.
    fn watch_loop(self: Arc<Self>) {
        let mut watched: Vec<PathBuf> = Vec::new();
        let mut stream: Option<Box<dyn ChangeStream>> = None;
        loop {
            let result = self.run_engine();
            let inputs = match &result {
                Ok(output) => std::iter::once(self.options.config.clone())
                    .chain(output.file_dependencies.iter().cloned())
                    .collect(),
                Err(_) if stream.is_some() => watched.clone(),
                Err(_) => vec![self.options.config.clone()],
            };
            let outcome = self.complete(result, true);

            if stream.is_none() || inputs != watched {
                stream = self.subscribe(&inputs);
                watched = inputs;
                if let Ok(entry) = &outcome {
                    if let Err(e) = freshness::validate(entry, &self.options.config) {
                        if e.is_stale() {
                            tracing::debug!(id = self.id(), error = %e, "inputs changed during build");
                            self.lock().state = BuildState::Running;
                            continue;
                        }
                    }
                }
            }

            let changed = stream.as_mut().and_then(|stream| stream.next_change());

            let mut inner = self.lock();
            if let Some(changed) = changed {
                tracing::debug!(id = self.id(), changed = changed.len(), "inputs changed");
                inner.state = BuildState::Running;
                continue;
            }
            if inner.pending.is_empty() {
                tracing::debug!(id = self.id(), "watch mode ended");
                inner.watching = false;
                return;
            }
            stream = None;
            inner.state = BuildState::Running;
        }
    }

    fn subscribe(&self, paths: &[PathBuf]) -> Option<Box<dyn ChangeStream>> {
        match self.collaborators.watcher.watch(paths) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(id = self.id(), error = %e, "cannot watch build inputs");
                None
            }
        }
    }

    fn run_engine(&self) -> anyhow::Result<BuildOutput> {
        tracing::info!(
            id = self.id(),
            config = %self.options.config.display(),
            watch = self.options.watch,
            "starting build"
        );
        let started = Instant::now();
        let started_at = now_millis();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.collaborators.engine.run_build(&self.options)
        }))
        .unwrap_or_else(|_| Err(anyhow!("build engine panicked")));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(id = self.id(), elapsed_ms, "build finished"),
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(id = self.id(), elapsed_ms, %error, "build failed");
            }
        }
        result.map(|mut output| {
            output.start_time.get_or_insert(started_at);
            output
        })
    }

    /// Record the outcome of a build and hand it to everyone waiting on it
    fn complete(&self, result: anyhow::Result<BuildOutput>, indicate_change: bool) -> BuildOutcome {
        let mut inner = self.lock();

        let outcome: BuildOutcome = match result {
            Ok(output) => {
                let entry = Arc::new(self.entry_from(output));
                let stored = self.open_cache(&mut inner).and_then(|cache| {
                    lock_cache(&cache).set(&self.fingerprint, Arc::clone(&entry), indicate_change)
                });
                match stored {
                    Ok(()) => {
                        inner.last_result = Some(Arc::clone(&entry));
                        inner.state = BuildState::Fresh;
                        Ok(entry)
                    }
                    Err(e) => {
                        tracing::warn!(id = self.id(), error = %e, "failed to record build result");
                        inner.state = BuildState::Idle;
                        Err(Arc::new(e))
                    }
                }
            }
            Err(e) => {
                inner.state = BuildState::Idle;
                if self.options.watch {
                    inner.last_result = None;
                }
                Err(Arc::new(BuildCacheError::Build(e)))
            }
        };

        let mut waiters = std::mem::take(&mut inner.pending);
        waiters.append(&mut inner.once_done);
        drop(inner);

        for callback in waiters {
            callback(outcome.clone());
        }
        outcome
    }

    fn entry_from(&self, output: BuildOutput) -> CacheEntry {
        CacheEntry {
            start_time: output.start_time.unwrap_or_else(now_millis),
            file_dependencies: output.file_dependencies,
            dependencies: output.dependencies,
            stats: output.stats,
            config: Some(self.options.config.clone()),
            build_hash: Some(self.fingerprint.clone()),
        }
    }
}
