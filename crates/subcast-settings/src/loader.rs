//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SubcastSettings::default()`]
//! 2. If `~/.subcast/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SubcastSettings;

/// Resolve the path to the settings file (`~/.subcast/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".subcast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SubcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SubcastSettings> {
    let defaults = serde_json::to_value(SubcastSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SubcastSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Merge `overlay` into `base`, recursing through nested objects.
///
/// Scalars and arrays in `overlay` win outright; a null in `overlay` leaves
/// the `base` value alone, so a sparse settings file only touches the keys
/// it names.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if overlay_val.is_null() {
                    continue;
                }
                let value = match merged.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut SubcastSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Override application with an injected variable lookup, so tests can
/// drive it without mutating process environment.
fn apply_overrides<F>(settings: &mut SubcastSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read_string(&lookup, "SUBCAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_port(&lookup, "SUBCAST_PORT") {
        settings.server.port = v;
    }
    if let Some(v) = read_string(&lookup, "SUBCAST_BUS_URL") {
        settings.bus.url = v;
    }
    if let Some(v) = read_string(&lookup, "SUBCAST_SUBJECT") {
        settings.bus.subject = v;
    }
    if let Some(v) = read_string(&lookup, "SUBCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a port number.
pub fn parse_port(val: &str) -> Option<u16> {
    val.parse().ok()
}

fn read_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

fn read_port<F>(lookup: &F, name: &str) -> Option<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(name)?;
    let result = parse_port(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid port env var, ignoring");
    }
    result
}
