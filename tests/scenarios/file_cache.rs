//! Scenario: Persisted results across processes
//!
//! Journey: A build server restarts and must answer from the cache file left
//! by its previous run, rebuilding only what changed.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use buildcache::{BuildOptions, Collaborators, LoadOutcome, MemorySink, Registry, ResultCache};
use serde_json::json;

use crate::common::*;

const WAIT: Duration = Duration::from_secs(5);

fn registry(engine: Arc<FakeEngine>) -> Registry {
    Registry::new(Collaborators::new(engine))
}

#[test]
fn scenario_explicit_cache_file_and_build_hash_are_respected() {
    let env = TestEnv::new();
    let cache_file = env.write_file(
        "cache_dir/test_cacheFile.json",
        &cache_file_with("foo", &env.config(), 2000),
    );
    let engine = FakeEngine::new();
    let registry = registry(Arc::clone(&engine));

    let options = BuildOptions::new(env.config())
        .with_cache_file(&cache_file)
        .with_build_hash("foo");
    let coordinator = registry.coordinator(&options);
    let entry = coordinator.build_blocking().unwrap();

    assert_eq!(entry.stats, json!({ "test": { "foo": "bar" } }));
    assert_eq!(coordinator.cache_path(), cache_file);
    assert_eq!(engine.calls(), 0);
}

#[test]
fn scenario_cache_file_is_derived_from_cache_dir_and_fingerprint() {
    let env = TestEnv::new();
    let registry = registry(FakeEngine::new());

    let options = BuildOptions::new(env.config()).with_cache_dir(env.cache_dir());
    let (tx, rx) = mpsc::channel();
    let coordinator = registry.build(&options, move |outcome| {
        let _ = tx.send(outcome);
    });
    rx.recv_timeout(WAIT).unwrap().unwrap();

    let fingerprint = coordinator.fingerprint().to_string();
    let expected = env.cache_dir().join(format!("{fingerprint}.json"));
    assert_eq!(coordinator.cache_path(), expected);
    assert!(coordinator.cache_path().starts_with(env.cache_dir()));

    let stored = env.read_json(&expected);
    assert_eq!(stored[&fingerprint]["buildHash"], json!(fingerprint));
    assert_eq!(stored[&fingerprint]["stats"]["build"], json!(1));
}

#[test]
fn scenario_restart_serves_previous_result() {
    let env = TestEnv::new();
    let engine = FakeEngine::new();
    let options = BuildOptions::new(env.config()).with_cache_dir(env.cache_dir());

    let first = registry(Arc::clone(&engine))
        .coordinator(&options)
        .build_blocking()
        .unwrap();

    // Simulated restart: a fresh registry with no in-memory state
    let second = registry(Arc::clone(&engine))
        .coordinator(&options)
        .build_blocking()
        .unwrap();

    assert_eq!(first.stats, second.stats);
    assert_eq!(engine.calls(), 1);
}

#[test]
fn scenario_changed_dependency_forces_rebuild() {
    let env = TestEnv::new();
    let entry_js = env.write_file("entry.js", "console.log('__ENTRY__');");
    env.age_file("entry.js", Duration::from_secs(60));
    let engine = FakeEngine::with_file_dependencies(vec![entry_js]);
    let options = BuildOptions::new(env.config()).with_cache_dir(env.cache_dir());

    registry(Arc::clone(&engine))
        .coordinator(&options)
        .build_blocking()
        .unwrap();

    env.touch_ahead("entry.js", Duration::from_secs(60));

    let rebuilt = registry(Arc::clone(&engine))
        .coordinator(&options)
        .build_blocking()
        .unwrap();

    assert_eq!(rebuilt.stats["build"], json!(2));
    assert_eq!(engine.calls(), 2);
}

#[test]
fn scenario_expired_entries_are_dropped_on_open() {
    let env = TestEnv::new();
    let cache_file = env.write_file(
        "cache_dir/shared.json",
        &cache_file_with("old", &env.config(), -10 * 60 * 60 * 1000),
    );

    let options = BuildOptions::new(env.config())
        .with_cache_file(&cache_file)
        .with_ttl(Duration::from_secs(60 * 60));
    registry(FakeEngine::new())
        .coordinator(&options)
        .build_blocking()
        .unwrap();

    let stored = env.read_json(&cache_file);
    assert!(stored.get("old").is_none());
    assert!(stored.get(options.fingerprint()).is_some());
}

#[test]
fn scenario_corrupt_cache_file_is_a_cold_start() {
    let env = TestEnv::new();
    let cache_file = env.write_file("cache_dir/broken.json", "{ not json");
    let sink = MemorySink::new();

    let cache = ResultCache::open(&cache_file, None, Some(Arc::new(sink.clone()))).unwrap();
    assert!(matches!(cache.load_outcome(), LoadOutcome::Corrupt { .. }));
    assert!(cache.is_empty());
    assert!(sink
        .messages()
        .iter()
        .any(|m| m.starts_with("ignored unreadable cache file")));

    // Rewritten as an empty map on open
    assert_eq!(env.read_json(&cache_file), json!({}));
}
