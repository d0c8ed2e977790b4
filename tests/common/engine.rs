//! Scriptable build engine.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildcache::{BuildEngine, BuildOptions, BuildOutput};
use serde_json::json;

/// Engine that numbers its builds and optionally waits at a gate before
/// finishing each one
#[derive(Default)]
pub struct FakeEngine {
    calls: AtomicUsize,
    file_dependencies: Vec<PathBuf>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Engine whose builds block until the returned sender releases them
    pub fn gated() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let engine = Self {
            gate: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(engine), tx)
    }

    pub fn with_file_dependencies(files: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            file_dependencies: files,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BuildEngine for FakeEngine {
    fn run_build(&self, options: &BuildOptions) -> anyhow::Result<BuildOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }
        let stats = json!({
            "build": n,
            "pathsToAssets": { "output.js": options.config.with_file_name("output.js") },
        });
        Ok(BuildOutput::new(stats).with_file_dependencies(self.file_dependencies.clone()))
    }
}
