//! Scenario: Project settings drive cache placement
//!
//! Journey: A team checks a `.buildcache.toml` into the project so every
//! developer's build server keeps its cache in the same place.

use std::time::Duration;

use buildcache::config::PROJECT_SETTINGS_FILE;
use buildcache::{BuildOptions, Collaborators, Registry, Settings};

use crate::common::*;

#[test]
fn scenario_project_settings_place_cache_files() {
    let env = TestEnv::new();
    let cache_dir = env.path("shared-cache");
    env.write_file(
        PROJECT_SETTINGS_FILE,
        &format!(
            "[cache]\ndir = {:?}\nttl_secs = 3600\n\n[watch]\ndebounce_ms = 250\n",
            cache_dir.display().to_string()
        ),
    );

    let settings = Settings::load(&env.path(PROJECT_SETTINGS_FILE)).unwrap();
    assert_eq!(settings.cache.ttl(), Some(Duration::from_secs(3600)));
    assert_eq!(settings.watch.debounce(), Duration::from_millis(250));

    let options = BuildOptions::from_settings(env.config(), &settings);
    let collaborators = Collaborators::from_settings(FakeEngine::new(), &settings);
    let registry = Registry::new(collaborators);
    let coordinator = registry.coordinator(&options);
    coordinator.build_blocking().unwrap();

    assert!(coordinator.cache_path().starts_with(&cache_dir));
    assert!(coordinator.cache_path().exists());
}

#[test]
fn scenario_unknown_settings_keys_are_reported() {
    let env = TestEnv::new();
    env.write_file(PROJECT_SETTINGS_FILE, "[cache]\nttl_sec = 60\n");

    let (settings, warnings) =
        Settings::load_with_warnings(&env.path(PROJECT_SETTINGS_FILE)).unwrap();

    assert_eq!(settings.cache.ttl(), None);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].section.as_deref(), Some("cache"));
    assert_eq!(warnings[0].key, "ttl_sec");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("ttl_secs"));
}
