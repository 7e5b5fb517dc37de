//! Shared configuration for slvctl.
//!
//! TOML defaults layered with environment variables, the persisted
//! backend URL and its history, and translation to
//! `slvctl_core::SessionConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slvctl_core::{SessionConfig, TlsMode};

/// Maximum number of remembered backend URLs.
pub const HISTORY_LIMIT: usize = 5;

/// Overrides the platform config directory when set.
pub const CONFIG_DIR_ENV: &str = "SLVCTL_CONFIG_DIR";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Quiet period after a local write, in milliseconds.
    #[serde(default = "default_gate_delay_ms")]
    pub gate_delay_ms: u64,

    /// Health poll interval for `health --watch`, in milliseconds.
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,

    /// Open the real-time channel for commands that need it.
    #[serde(default = "default_realtime")]
    pub realtime: bool,

    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            gate_delay_ms: default_gate_delay_ms(),
            health_interval_ms: default_health_interval_ms(),
            realtime: default_realtime(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_gate_delay_ms() -> u64 {
    500
}
fn default_health_interval_ms() -> u64 {
    500
}
fn default_realtime() -> bool {
    true
}

// ── Persisted backend state ─────────────────────────────────────────

/// Backend URL and the most-recent-first list of URLs used before.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    #[serde(default)]
    pub backend_history: Vec<String>,
}

impl BackendState {
    /// Store a backend URL.
    ///
    /// A URL not yet in the history is put at its front; the oldest entry
    /// is dropped past [`HISTORY_LIMIT`]. A URL already in the history
    /// keeps its position.
    pub fn set_backend_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        let url = validate_backend_url(raw)?;

        if !self.backend_history.contains(&url) {
            self.backend_history.insert(0, url.clone());
            self.backend_history.truncate(HISTORY_LIMIT);
        }
        self.backend_url = Some(url);
        Ok(())
    }

    /// Forget the current URL. History is kept.
    pub fn clear_backend_url(&mut self) {
        self.backend_url = None;
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_deref().filter(|s| !s.is_empty())
    }
}

/// Accept only absolute http(s) URLs; returns the trimmed input.
fn validate_backend_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let invalid = |reason: String| ConfigError::Validation {
        field: "backend URL".into(),
        reason,
    };

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(format!("'{trimmed}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_owned()),
        other => Err(invalid(format!(
            "expected an http or https URL, got scheme '{other}'"
        ))),
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config directory via `SLVCTL_CONFIG_DIR` or platform
/// conventions.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("org", "slvctrl", "slvctl").map_or_else(dirs_fallback, |dirs| {
        dirs.config_dir().to_path_buf()
    })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("slvctl");
    p
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn state_path() -> PathBuf {
    config_dir().join("state.toml")
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `SLVCTL_DEFAULTS__GATE_DELAY_MS=750`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SLVCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config");
        Config::default()
    })
}

// ── Backend state ───────────────────────────────────────────────────

pub fn load_state() -> Result<BackendState, ConfigError> {
    load_state_from(&state_path())
}

/// Read the backend state; a missing file is an empty state.
pub fn load_state_from(path: &Path) -> Result<BackendState, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BackendState::default()),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_state(state: &BackendState) -> Result<(), ConfigError> {
    save_state_to(&state_path(), state)
}

pub fn save_state_to(path: &Path, state: &BackendState) -> Result<(), ConfigError> {
    write_toml(path, state)
}

fn write_toml(path: &Path, value: &impl Serialize) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(value)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `SessionConfig` from the config defaults and a backend URL.
pub fn session_config(config: &Config, backend_url: Option<String>) -> SessionConfig {
    let d = &config.defaults;

    let tls = if d.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca) = d.ca_cert {
        TlsMode::CustomCa(ca.clone())
    } else {
        TlsMode::System
    };

    SessionConfig {
        backend_url,
        tls,
        timeout: Duration::from_secs(d.timeout),
        gate_delay: Duration::from_millis(d.gate_delay_ms),
        realtime: d.realtime,
        health_interval: None,
        ..SessionConfig::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn history_is_most_recent_first_and_deduplicated() {
        let mut state = BackendState::default();
        state.set_backend_url("http://a:1337").unwrap();
        state.set_backend_url("http://b:1337").unwrap();
        state.set_backend_url("http://a:1337").unwrap();

        assert_eq!(state.backend_url(), Some("http://a:1337"));
        assert_eq!(state.backend_history, ["http://b:1337", "http://a:1337"]);
    }

    #[test]
    fn sixth_distinct_url_drops_the_oldest() {
        let mut state = BackendState::default();
        for i in 1..=6 {
            state.set_backend_url(&format!("http://host{i}:1337")).unwrap();
        }

        assert_eq!(state.backend_history.len(), HISTORY_LIMIT);
        assert_eq!(state.backend_history[0], "http://host6:1337");
        assert!(!state.backend_history.contains(&"http://host1:1337".to_owned()));
    }

    #[test]
    fn clear_keeps_history() {
        let mut state = BackendState::default();
        state.set_backend_url("http://a:1337").unwrap();
        state.clear_backend_url();

        assert!(state.backend_url().is_none());
        assert_eq!(state.backend_history, ["http://a:1337"]);
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut state = BackendState::default();
        assert!(state.set_backend_url("ftp://files").is_err());
        assert!(state.set_backend_url("localhost:1337").is_err());
        assert!(state.backend_url().is_none());
        assert!(state.backend_history.is_empty());
    }

    #[test]
    fn state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        assert_eq!(load_state_from(&path).unwrap(), BackendState::default());

        let mut state = BackendState::default();
        state.set_backend_url("http://slv.local:1337").unwrap();
        save_state_to(&path, &state).unwrap();

        assert_eq!(load_state_from(&path).unwrap(), state);
    }

    #[test]
    fn corrupt_state_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "backend_history = 7").unwrap();

        assert!(matches!(load_state_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[defaults]\ngate_delay_ms = 750\noutput = \"json\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.gate_delay_ms, 750);
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.timeout, 30);
    }

    #[test]
    fn session_config_translation() {
        let mut config = Config::default();
        config.defaults.insecure = true;
        config.defaults.gate_delay_ms = 250;

        let session = session_config(&config, Some("http://a:1337".into()));
        assert!(matches!(session.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(session.gate_delay, Duration::from_millis(250));
        assert_eq!(session.backend_url.as_deref(), Some("http://a:1337"));
    }
}
