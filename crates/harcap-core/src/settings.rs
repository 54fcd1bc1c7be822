//! Layered configuration for the capture service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`Settings::default()`]
//! 2. **User file** — `~/.harcap/settings.json` (missing fields fall back
//!    to defaults)
//! 3. **Environment variables** — `HARCAP_*` overrides (highest priority)
//!
//! Invalid env values are ignored with a warning rather than failing
//! startup; an unparseable settings file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading the settings file failed.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON or has the wrong shape.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// HTTP/WebSocket control surface.
    pub server: ServerSettings,
    /// Browser endpoint and discovery.
    pub chrome: ChromeSettings,
    /// Capture behavior.
    pub capture: CaptureSettings,
}

/// Control-surface bind settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8790,
        }
    }
}

/// Browser debugging endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChromeSettings {
    /// Host of the DevTools HTTP endpoint.
    pub debug_host: String,
    /// Port of the DevTools HTTP endpoint.
    pub debug_port: u16,
    /// Launch a local Chrome when the endpoint is unreachable.
    pub autolaunch: bool,
    /// Explicit Chrome binary path (otherwise discovered).
    pub chrome_path: Option<PathBuf>,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            debug_host: "127.0.0.1".to_owned(),
            debug_port: 9222,
            autolaunch: false,
            chrome_path: None,
        }
    }
}

/// Capture behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    /// Quiet interval after the page-load signal before export fires, in
    /// milliseconds.
    pub quiet_period_ms: u64,
    /// Timeout for one protocol command round-trip, in milliseconds.
    pub command_timeout_ms: u64,
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            quiet_period_ms: 2000,
            command_timeout_ms: 30_000,
            output_dir: PathBuf::from("captures"),
        }
    }
}

impl CaptureSettings {
    /// Quiet interval as a [`Duration`].
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Command timeout as a [`Duration`].
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Resolve the path to the settings file (`~/.harcap/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".harcap").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let mut settings = if path.exists() {
        tracing::debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        tracing::debug!(?path, "settings file not found, using defaults");
        Settings::default()
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within range; booleans accept
/// `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`. Invalid values are
/// ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(v) = read_env_string("HARCAP_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("HARCAP_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("HARCAP_CHROME_HOST") {
        settings.chrome.debug_host = v;
    }
    if let Some(v) = read_env_u16("HARCAP_CHROME_PORT", 1, 65535) {
        settings.chrome.debug_port = v;
    }
    if let Some(v) = read_env_bool("HARCAP_AUTOLAUNCH") {
        settings.chrome.autolaunch = v;
    }
    if let Some(v) = read_env_string("HARCAP_CHROME_PATH") {
        settings.chrome.chrome_path = Some(PathBuf::from(v));
    }
    if let Some(v) = read_env_u64("HARCAP_QUIET_MS", 0, 600_000) {
        settings.capture.quiet_period_ms = v;
    }
    if let Some(v) = read_env_u64("HARCAP_COMMAND_TIMEOUT_MS", 100, 600_000) {
        settings.capture.command_timeout_ms = v;
    }
    if let Some(v) = read_env_string("HARCAP_OUTPUT_DIR") {
        settings.capture.output_dir = PathBuf::from(v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
#[must_use]
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
#[must_use]
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
#[must_use]
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8790);
        assert_eq!(settings.chrome.debug_port, 9222);
        assert!(!settings.chrome.autolaunch);
        assert_eq!(settings.capture.quiet_period_ms, 2000);
        assert_eq!(settings.capture.command_timeout_ms, 30_000);
        assert_eq!(settings.capture.output_dir, PathBuf::from("captures"));
    }

    #[test]
    fn duration_helpers() {
        let capture = CaptureSettings::default();
        assert_eq!(capture.quiet_period(), Duration::from_millis(2000));
        assert_eq!(capture.command_timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, Settings::default().server.port);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9100}, "capture": {"quietPeriodMs": 500}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.capture.quiet_period_ms, 500);
        assert_eq!(settings.capture.command_timeout_ms, 30_000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u16_range_enforces_bounds() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_u64_range_enforces_bounds() {
        assert_eq!(parse_u64_range("2000", 0, 600_000), Some(2000));
        assert_eq!(parse_u64_range("700000", 0, 600_000), None);
        assert_eq!(parse_u64_range("-1", 0, 600_000), None);
    }

    #[test]
    fn settings_serialize_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json["capture"].get("quietPeriodMs").is_some());
        assert!(json["chrome"].get("debugPort").is_some());
    }
}
