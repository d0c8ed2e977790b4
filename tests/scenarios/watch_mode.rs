//! Scenario: Development server in watch mode
//!
//! Journey: A dev server starts with a warm cache, serves it immediately,
//! then switches to live rebuilds once the watcher has produced a result.

use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use buildcache::{
    BuildOptions, BuildState, CacheAuthority, Collaborators, ManualWatchSource, Registry,
    WatchSource,
};
use serde_json::json;

use crate::common::*;

const WAIT: Duration = Duration::from_secs(5);

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn scenario_cached_data_is_served_until_watcher_completes() {
    let env = TestEnv::new();
    let cache_file = env.write_file(
        "cache_dir/test_cache_stops_once_watcher_done.json",
        &cache_file_with("foo", &env.config(), 2000),
    );
    let (engine, release) = FakeEngine::gated();
    let watcher = Arc::new(ManualWatchSource::new());
    let registry = Registry::new(
        Collaborators::new(engine).with_watcher(Arc::clone(&watcher) as Arc<dyn WatchSource>),
    );
    let options = BuildOptions::new(env.config())
        .with_cache_file(&cache_file)
        .with_watch(true)
        .with_build_hash("foo");

    let coordinator = registry.coordinator(&options);
    let data1 = coordinator.build_blocking().unwrap();
    assert_eq!(data1.stats, json!({ "test": { "foo": "bar" } }));
    assert_eq!(coordinator.options().cache_file.as_ref(), Some(&cache_file));
    assert!(Arc::ptr_eq(&data1, &coordinator.cached_entry().unwrap()));
    assert_eq!(coordinator.authority(), CacheAuthority::Authoritative);

    // The watcher's first build is still running: the cache keeps answering
    let data2 = registry.coordinator(&options).build_blocking().unwrap();
    assert!(Arc::ptr_eq(&data2, &data1));
    assert_eq!(coordinator.state(), BuildState::Cached);
    assert_eq!(coordinator.authority(), CacheAuthority::Authoritative);

    let (tx, rx) = mpsc::channel();
    coordinator.once_done(move |outcome| {
        let _ = tx.send(outcome);
    });
    release.send(()).unwrap();

    let data3 = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&data3, &data2));
    assert_eq!(coordinator.authority(), CacheAuthority::Delegating);
    let stored = coordinator.cached_entry().unwrap();
    assert_eq!(stored.build_hash.as_deref(), Some("foo"));
    assert_eq!(stored.build_hash.as_deref(), coordinator.options().build_hash.as_deref());

    let data4 = registry.coordinator(&options).build_blocking().unwrap();
    assert_eq!(data4.stats, data3.stats);

    watcher.close();
    wait_until(|| !coordinator.is_watching());
}

#[test]
fn scenario_file_change_triggers_rebuild() {
    let env = TestEnv::new();
    let entry_js = env.write_file("entry.js", "console.log('__ENTRY__');");
    let engine = FakeEngine::with_file_dependencies(vec![entry_js.clone()]);
    let watcher = Arc::new(ManualWatchSource::new());
    let registry = Registry::new(
        Collaborators::new(Arc::clone(&engine) as Arc<dyn buildcache::BuildEngine>)
            .with_watcher(Arc::clone(&watcher) as Arc<dyn WatchSource>),
    );
    let options = BuildOptions::new(env.config())
        .with_cache_dir(env.cache_dir())
        .with_watch(true);

    let coordinator = registry.coordinator(&options);
    let first = coordinator.build_blocking().unwrap();
    assert_eq!(first.stats["build"], json!(1));

    wait_until(|| !watcher.watched().is_empty());
    assert!(watcher.watched()[0].contains(&entry_js));

    let (tx, rx) = mpsc::channel();
    coordinator.once_done(move |outcome| {
        let _ = tx.send(outcome);
    });
    watcher.trigger(vec![entry_js]);

    let second = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(second.stats["build"], json!(2));
    assert!(Arc::ptr_eq(&second, &coordinator.build_blocking().unwrap()));
    assert_eq!(engine.calls(), 2);

    // The persisted entry follows the live result
    let stored = env.read_json(&coordinator.cache_path());
    assert_eq!(stored[coordinator.fingerprint()]["stats"]["build"], json!(2));

    watcher.close();
    wait_until(|| !coordinator.is_watching());
}
