#![no_main]

use std::time::Duration;

use buildcache::{LoadOutcome, ResultCache};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("cache.json");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    // Any file content opens; unreadable content is a cold start
    let cache = ResultCache::open(&path, Some(Duration::from_secs(3600)), None)
        .expect("opening a writable cache never fails");
    if let LoadOutcome::Loaded { entries, .. } = cache.load_outcome() {
        assert_eq!(*entries, cache.len());
    }

    // What was written back must load again
    let reopened = std::fs::read(&path).expect("cache file written");
    serde_json::from_slice::<serde_json::Value>(&reopened).expect("persisted cache is JSON");
});
