//! Settings loading: defaults, file, then environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::GatewaySettings;

/// Default settings file, relative to the gateway's working directory.
const SETTINGS_FILE: &str = "tollgate.json";

/// Path the gateway reads settings from by default.
pub fn settings_path() -> PathBuf {
    PathBuf::from(SETTINGS_FILE)
}

/// Load settings from the default path, falling back to compiled
/// defaults when the file does not exist.
pub fn load_settings() -> Result<GatewaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`. A missing file is not an error; a present
/// but malformed file is.
pub fn load_settings_from_path(path: &Path) -> Result<GatewaySettings> {
    load_with(path, |name| env::var(name).ok())
}

/// Load settings from `path`, reading overrides through `env`. The
/// lookup seam keeps the override logic testable without touching the
/// process environment.
fn load_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GatewaySettings> {
    let mut merged = serde_json::to_value(GatewaySettings::default())?;

    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        deep_merge(&mut merged, file_value);
        debug!(path = %path.display(), "loaded settings file");
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
    }

    let mut settings: GatewaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, &env);
    Ok(settings)
}

/// Recursively merge `overlay` into `base`. Objects merge key by key,
/// everything else replaces. Nulls in the overlay are skipped so a file
/// cannot accidentally blank out a default.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if overlay_value.is_null() {
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        let _ = base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Apply `TOLLGATE_*` environment variable overrides. Invalid values
/// are logged and ignored rather than failing the load.
fn apply_env_overrides(settings: &mut GatewaySettings, env: &impl Fn(&str) -> Option<String>) {
    if let Some(host) = read_env_string(env, "TOLLGATE_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = read_env_parsed(env, "TOLLGATE_PORT") {
        settings.server.port = port;
    }
    if let Some(prefix) = read_env_string(env, "TOLLGATE_API_PREFIX") {
        settings.server.api_prefix = prefix;
    }
    if let Some(root) = read_env_string(env, "TOLLGATE_STATIC_ROOT") {
        settings.server.static_root = root;
    }
    if let Some(host) = read_env_string(env, "TOLLGATE_UPSTREAM_HOST") {
        settings.upstream.host = host;
    }
    if let Some(port) = read_env_parsed(env, "TOLLGATE_UPSTREAM_PORT") {
        settings.upstream.port = port;
    }
    if let Some(interpreter) = read_env_string(env, "TOLLGATE_BRIDGE_INTERPRETER") {
        settings.bridge.interpreter = interpreter;
    }
    if let Some(cap) = read_env_parsed(env, "TOLLGATE_BRIDGE_MAX_CONCURRENCY") {
        settings.bridge.max_concurrency = cap;
    }
    if let Some(ms) = read_env_parsed(env, "TOLLGATE_BRIDGE_TIMEOUT_MS") {
        settings.bridge.timeout_ms = ms;
    }
    if let Some(attempts) = read_env_parsed(env, "TOLLGATE_REALTIME_MAX_ATTEMPTS") {
        settings.realtime.max_attempts = attempts;
    }
}

fn read_env_string(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name).filter(|v| !v.is_empty())
}

fn read_env_parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = env(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.bridge.interpreter, "python3");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 9090}}, "upstream": {{"host": "10.0.0.5"}}}}"#
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.upstream.host, "10.0.0.5");
        // untouched sections keep their defaults
        assert_eq!(settings.server.api_prefix, "/api");
        assert_eq!(settings.upstream.port, 8000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn deep_merge_replaces_arrays_whole() {
        let mut base = json!({"args": ["a", "b"], "nested": {"keep": 1, "swap": 2}});
        deep_merge(&mut base, json!({"args": ["c"], "nested": {"swap": 3}}));
        assert_eq!(base["args"], json!(["c"]));
        assert_eq!(base["nested"]["keep"], 1);
        assert_eq!(base["nested"]["swap"], 3);
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let mut base = json!({"host": "0.0.0.0", "port": 8080});
        deep_merge(&mut base, json!({"host": null, "port": 9000}));
        assert_eq!(base["host"], "0.0.0.0");
        assert_eq!(base["port"], 9000);
    }

    #[test]
    fn deep_merge_adds_new_keys() {
        let mut base = json!({"a": 1});
        deep_merge(&mut base, json!({"b": {"c": 2}}));
        assert_eq!(base["a"], 1);
        assert_eq!(base["b"]["c"], 2);
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.json");
        std::fs::write(&path, r#"{"server": {"port": 9090}}"#).unwrap();

        let settings = load_with(&path, |name| match name {
            "TOLLGATE_PORT" => Some("9999".into()),
            "TOLLGATE_UPSTREAM_HOST" => Some("10.1.1.9".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.upstream.host, "10.1.1.9");
        // fields without an override keep the merged file/default values
        assert_eq!(settings.server.api_prefix, "/api");
    }

    #[test]
    fn unparseable_env_override_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.json");
        std::fs::write(&path, r#"{"server": {"port": 9090}}"#).unwrap();

        let settings = load_with(&path, |name| match name {
            "TOLLGATE_PORT" => Some("abc".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.server.port, 9090);
    }

    #[test]
    fn empty_env_override_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_with(&dir.path().join("absent.json"), |name| match name {
            "TOLLGATE_HOST" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn env_overrides_cover_numeric_fields() {
        let mut settings = GatewaySettings::default();
        apply_env_overrides(&mut settings, &|name| match name {
            "TOLLGATE_BRIDGE_MAX_CONCURRENCY" => Some("2".into()),
            "TOLLGATE_BRIDGE_TIMEOUT_MS" => Some("1500".into()),
            "TOLLGATE_REALTIME_MAX_ATTEMPTS" => Some("9".into()),
            _ => None,
        });
        assert_eq!(settings.bridge.max_concurrency, 2);
        assert_eq!(settings.bridge.timeout_ms, 1500);
        assert_eq!(settings.realtime.max_attempts, 9);
    }
}
