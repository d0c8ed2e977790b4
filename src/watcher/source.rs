//! Watch collaborator interfaces

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::error::{BuildCacheError, BuildCacheResult};

/// Produces change streams over a set of files
pub trait WatchSource: Send + Sync {
    /// Start watching `paths`. The returned stream reports batches of changed
    /// files until it is dropped or the source shuts down.
    fn watch(&self, paths: &[PathBuf]) -> BuildCacheResult<Box<dyn ChangeStream>>;
}

/// A live subscription to file changes
pub trait ChangeStream: Send {
    /// Block until the next batch of changes; `None` once watching has ended
    fn next_change(&mut self) -> Option<Vec<PathBuf>>;
}

/// Watch source driven by explicit `trigger` calls
///
/// Triggers sent before a stream exists are buffered and delivered to the
/// next stream. Intended for one watching coordinator at a time.
#[derive(Clone)]
pub struct ManualWatchSource {
    sender: Arc<Mutex<Option<Sender<Vec<PathBuf>>>>>,
    receiver: Arc<Mutex<Receiver<Vec<PathBuf>>>>,
    watched: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl Default for ManualWatchSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualWatchSource {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(Mutex::new(rx)),
            watched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report `changed` as one batch. Returns false once closed.
    pub fn trigger(&self, changed: Vec<PathBuf>) -> bool {
        match self.sender.lock() {
            Ok(sender) => sender
                .as_ref()
                .is_some_and(|tx| tx.send(changed).is_ok()),
            Err(_) => false,
        }
    }

    /// End all current and future streams
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    /// Path sets passed to `watch`, in call order
    pub fn watched(&self) -> Vec<Vec<PathBuf>> {
        self.watched
            .lock()
            .map(|watched| watched.clone())
            .unwrap_or_default()
    }
}

impl WatchSource for ManualWatchSource {
    fn watch(&self, paths: &[PathBuf]) -> BuildCacheResult<Box<dyn ChangeStream>> {
        self.watched
            .lock()
            .map_err(|_| BuildCacheError::Watch {
                message: "manual watch source poisoned".to_string(),
            })?
            .push(paths.to_vec());
        Ok(Box::new(ManualChangeStream {
            receiver: Arc::clone(&self.receiver),
        }))
    }
}

struct ManualChangeStream {
    receiver: Arc<Mutex<Receiver<Vec<PathBuf>>>>,
}

impl ChangeStream for ManualChangeStream {
    fn next_change(&mut self) -> Option<Vec<PathBuf>> {
        let receiver = self.receiver.lock().ok()?;
        receiver.recv().ok()
    }
}
