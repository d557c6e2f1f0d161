//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StrandSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `STRAND_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::StrandSettings;

/// Strand home directory (`~/.strand`).
pub fn strand_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".strand")
}

/// Default settings file (`~/.strand/settings.json`).
pub fn settings_path() -> PathBuf {
    strand_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    load_settings_with_env(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<StrandSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(StrandSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: StrandSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `STRAND_*` overrides read through `env`.
///
/// Numbers must parse and fall within range; anything else is ignored with
/// a warning and the file/default value stands.
pub fn apply_env_overrides<F>(settings: &mut StrandSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(v) = read("STRAND_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read("STRAND_POOL_SIZE")
        .and_then(|v| checked("STRAND_POOL_SIZE", &v, parse_u32_range(&v, 1, 256)))
    {
        settings.database.pool_size = v;
    }
    if let Some(v) = read("STRAND_BUSY_TIMEOUT_MS")
        .and_then(|v| checked("STRAND_BUSY_TIMEOUT_MS", &v, parse_u32_range(&v, 0, 600_000)))
    {
        settings.database.busy_timeout_ms = v;
    }
    if let Some(v) = read("STRAND_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
