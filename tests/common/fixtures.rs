//! Test fixtures - reusable content for tests.

use std::path::Path;

use serde_json::{json, Value};

/// A minimal build config
pub const BASIC_CONFIG: &str = "module.exports = { entry: './entry.js' };\n";

/// A cache file holding one entry under `id`, started `ahead_ms` in the future
/// so that it is fresh regardless of file mtimes
pub fn cache_file_with(id: &str, config: &Path, ahead_ms: i64) -> String {
    let start_time = chrono::Utc::now().timestamp_millis() + ahead_ms;
    let entry: Value = json!({
        "startTime": start_time,
        "fileDependencies": [],
        "dependencies": [],
        "stats": { "test": { "foo": "bar" } },
        "config": config,
        "buildHash": id,
    });
    json!({ id: entry }).to_string()
}
