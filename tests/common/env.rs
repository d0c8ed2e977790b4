//! Isolated test environment.

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Temp project with a build config and a cache directory
pub struct TestEnv {
    pub root: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();
        let env = Self {
            root: TempDir::new().expect("Failed to create temp dir"),
        };
        env.write_file("webpack.config.js", super::BASIC_CONFIG);
        env.age_file("webpack.config.js", Duration::from_secs(60));
        env
    }

    /// Get path relative to the project root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn config(&self) -> PathBuf {
        self.path("webpack.config.js")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path("cache_dir")
    }

    /// Write a file to the project directory
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let full_path = self.path(relative);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Move a file's mtime `age` into the past
    pub fn age_file(&self, relative: &str, age: Duration) {
        set_mtime(&self.path(relative), SystemTime::now() - age);
    }

    /// Move a file's mtime `ahead` into the future
    pub fn touch_ahead(&self, relative: &str, ahead: Duration) {
        set_mtime(&self.path(relative), SystemTime::now() + ahead);
    }

    pub fn read_json(&self, path: &Path) -> serde_json::Value {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
        serde_json::from_str(&content).expect("cache file is not JSON")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(time))
        .unwrap_or_else(|e| panic!("Failed to set mtime of {}: {}", path.display(), e));
}
