//! Filesystem watch source backed by `notify`

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{Settings, DEFAULT_DEBOUNCE_MS};
use crate::error::{BuildCacheError, BuildCacheResult};

use super::source::{ChangeStream, WatchSource};
use super::state::WatcherState;

/// How often a stream re-checks the debounce window and the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Watches files through the platform's native notification API
///
/// Each watched file's parent directory is registered non-recursively so that
/// editors replacing files by rename are still observed; events for other
/// files in those directories are ignored.
#[derive(Debug, Clone)]
pub struct FsWatchSource {
    debounce: Duration,
    running: Arc<AtomicBool>,
}

impl Default for FsWatchSource {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl FsWatchSource {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Debounced with the configured `[watch] debounce_ms`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.watch.debounce())
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Flag shared with every stream; clearing it ends them all
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// End all current and future streams
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl WatchSource for FsWatchSource {
    fn watch(&self, paths: &[PathBuf]) -> BuildCacheResult<Box<dyn ChangeStream>> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )
        .map_err(watch_error)?;

        let files: HashSet<PathBuf> = paths.iter().map(|p| canonical(p)).collect();
        let dirs: BTreeSet<PathBuf> = files
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .filter(|dir| dir.is_dir())
            .collect();

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(watch_error)?;
        }
        tracing::debug!(files = files.len(), dirs = dirs.len(), "watching build inputs");

        Ok(Box::new(FsChangeStream {
            _watcher: watcher,
            rx,
            files,
            state: WatcherState::new(self.debounce),
            running: Arc::clone(&self.running),
        }))
    }
}

struct FsChangeStream {
    _watcher: RecommendedWatcher,
    rx: Receiver<PathBuf>,
    files: HashSet<PathBuf>,
    state: WatcherState,
    running: Arc<AtomicBool>,
}

impl ChangeStream for FsChangeStream {
    fn next_change(&mut self) -> Option<Vec<PathBuf>> {
        while self.running.load(Ordering::SeqCst) {
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(path) => {
                    let path = canonical(&path);
                    if self.files.contains(&path) {
                        self.state.add_change(path);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Report what was already collected before ending
                    return self.state.has_pending().then(|| self.state.take_changes());
                }
            }

            if self.state.should_sync() {
                return Some(self.state.take_changes());
            }
        }
        None
    }
}

/// Canonicalize for consistent matching with notify events
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn watch_error(e: notify::Error) -> BuildCacheError {
    BuildCacheError::Watch {
        message: e.to_string(),
    }
}
