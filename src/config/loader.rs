//! Settings loading

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildCacheError, BuildCacheResult};

use super::types::Settings;

/// Settings file looked up in a project root
pub const PROJECT_SETTINGS_FILE: &str = ".buildcache.toml";

/// Keys accepted in each settings section; `""` is the top level
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("", &["cache", "watch"]),
    ("cache", &["dir", "ttl_secs"]),
    ("watch", &["debounce_ms"]),
];

/// A settings key buildcache does not recognize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Table holding the key, `None` for a top-level key
    pub section: Option<String>,
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    /// Closest known key of the same section
    pub suggestion: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        match &self.section {
            Some(section) => write!(f, ": unknown key `{}` in [{section}]", self.key)?,
            None => write!(f, ": unknown top-level key `{}`", self.key)?,
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean `{suggestion}`?)")?;
        }
        Ok(())
    }
}

/// Parse a settings file, reporting unknown keys instead of rejecting them
pub fn load_with_warnings(path: &Path) -> BuildCacheResult<(Settings, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;

    let mut ignored: Vec<String> = Vec::new();
    let settings: Settings =
        serde_ignored::deserialize(toml::de::Deserializer::new(&content), |p| {
            ignored.push(p.to_string());
        })
        .map_err(|e| BuildCacheError::Config {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let warnings = ignored
        .iter()
        .map(|dotted| unknown_key(path, &content, dotted))
        .collect();

    Ok((settings, warnings))
}

/// Load from project settings, user settings, or defaults
pub fn load_or_default(project_root: Option<&Path>) -> Settings {
    let project_settings = project_root.map(|root| root.join(PROJECT_SETTINGS_FILE));
    let user_settings = dirs::config_dir().map(|dir| dir.join("buildcache/config.toml"));

    for candidate in project_settings.into_iter().chain(user_settings) {
        if !candidate.exists() {
            continue;
        }
        match load_with_warnings(&candidate) {
            Ok((settings, warnings)) => {
                for warning in &warnings {
                    tracing::warn!("{warning}");
                }
                return with_env_overrides(settings);
            }
            Err(e) => tracing::warn!("ignoring {}: {}", candidate.display(), e),
        }
    }

    with_env_overrides(Settings::default())
}

/// Apply environment variable overrides (BUILDCACHE_* prefix)
pub fn with_env_overrides(mut settings: Settings) -> Settings {
    // BUILDCACHE_CACHE_DIR
    if let Ok(dir) = std::env::var("BUILDCACHE_CACHE_DIR") {
        if !dir.trim().is_empty() {
            settings.cache.dir = Some(PathBuf::from(dir));
        }
    }

    // BUILDCACHE_TTL_SECS (0 or empty disables the TTL)
    if let Ok(ttl) = std::env::var("BUILDCACHE_TTL_SECS") {
        settings.cache.ttl_secs = match ttl.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(secs),
            Err(_) if ttl.trim().is_empty() => None,
            Err(_) => {
                tracing::warn!("ignoring BUILDCACHE_TTL_SECS={:?}: not a number", ttl);
                settings.cache.ttl_secs
            }
        };
    }

    // BUILDCACHE_DEBOUNCE_MS
    if let Ok(ms) = std::env::var("BUILDCACHE_DEBOUNCE_MS") {
        if let Ok(ms) = ms.trim().parse::<u64>() {
            settings.watch.debounce_ms = ms;
        }
    }

    settings
}

/// Platform cache directory, falling back to the system temp directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("buildcache")
}

fn unknown_key(file: &Path, content: &str, dotted: &str) -> ConfigWarning {
    let (section, key) = match dotted.rsplit_once('.') {
        Some((section, key)) => (Some(section), key),
        None => (None, dotted),
    };
    ConfigWarning {
        section: section.map(str::to_string),
        key: key.to_string(),
        file: file.to_path_buf(),
        line: key_line(content, section, key),
        suggestion: suggest_key(section, key),
    }
}

/// Line of `key = ...` inside `[section]`, or of the `[key]` header for an
/// unknown top-level table
fn key_line(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[').and_then(|rest| rest.split(']').next()) {
            let header = header.trim_start_matches('[').trim();
            if section.is_none() && header.split('.').next() == Some(key) {
                return Some(i + 1);
            }
            current = Some(header);
            continue;
        }
        if current != section {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            if name.trim().trim_matches('"') == key {
                return Some(i + 1);
            }
        }
    }
    None
}

fn suggest_key(section: Option<&str>, unknown: &str) -> Option<String> {
    let (_, candidates) = KNOWN_KEYS
        .iter()
        .find(|(name, _)| *name == section.unwrap_or(""))?;

    candidates
        .iter()
        .map(|candidate| (candidate, levenshtein(unknown, candidate)))
        .min_by_key(|(_, dist)| *dist)
        .filter(|(_, dist)| *dist <= 2)
        .map(|(candidate, _)| candidate.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = if ac == bc { 0 } else { 1 };
            curr[j + 1] =
                std::cmp::min(std::cmp::min(prev[j + 1] + 1, curr[j] + 1), prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
