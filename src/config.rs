//! Configuration management for the podium gateway
//!
//! Three layers, each overriding the last: built-in defaults, an optional
//! TOML file (`~/.config/podium/config.toml`), and `PODIUM_*` environment
//! variables. All file fields are optional — the file is a partial
//! overlay, not a full schema.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::navigation::{DEFAULT_DEBOUNCE, NavigatorConfig, default_back_phrases};
use crate::{Error, Result};

/// Default relay listen port
pub const DEFAULT_PORT: u16 = 17171;

/// Default upstream streaming transcription endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "wss://streaming.assemblyai.com/v3/ws";

/// Podium gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the relay binds to
    pub bind: String,

    /// Port the relay listens on
    pub port: u16,

    /// Upstream transcription service settings
    pub upstream: UpstreamSettings,

    /// Relay URL the capture session connects to
    pub relay_url: String,

    /// Navigation tunables
    pub navigation: NavigationSettings,
}

/// Upstream transcription service settings
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// WebSocket endpoint of the streaming service
    pub url: String,

    /// Service credential; server-held, never sent to clients
    pub api_key: Option<SecretString>,

    /// Vocabulary boost hints passed at connect time
    pub keyterms: Vec<String>,
}

/// Navigation tunables as configured (see [`NavigatorConfig`])
#[derive(Debug, Clone)]
pub struct NavigationSettings {
    /// Cooldown between accepted navigations, in milliseconds
    pub debounce_ms: u64,

    /// Spoken back-command phrases
    pub back_phrases: Vec<String>,

    /// Route question-mark transcripts to question handling
    pub question_mode: bool,
}

impl NavigationSettings {
    /// Convert to the navigator's runtime config
    #[must_use]
    pub fn navigator_config(&self) -> NavigatorConfig {
        NavigatorConfig {
            debounce: std::time::Duration::from_millis(self.debounce_ms),
            back_phrases: self.back_phrases.clone(),
            question_mode: self.question_mode,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            upstream: UpstreamSettings {
                url: DEFAULT_UPSTREAM_URL.to_string(),
                api_key: None,
                keyterms: Vec::new(),
            },
            relay_url: format!("ws://127.0.0.1:{DEFAULT_PORT}/v1/listen"),
            navigation: NavigationSettings {
                debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(2000),
                back_phrases: default_back_phrases(),
                question_mode: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from defaults, file overlay, then environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or either
    /// file fails to parse
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read config {}: {e}", path.display()))
            })?;
            config.apply_file(&toml::from_str(&raw)?);
        } else if let Some(path) = default_config_path() {
            if path.exists() {
                let raw = std::fs::read_to_string(&path)?;
                config.apply_file(&toml::from_str(&raw)?);
                tracing::debug!(path = %path.display(), "loaded config file");
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Overlay an optional-field config file onto this config
    fn apply_file(&mut self, file: &ConfigFile) {
        if let Some(bind) = &file.relay.bind {
            self.bind.clone_from(bind);
        }
        if let Some(port) = file.relay.port {
            self.port = port;
        }
        if let Some(url) = &file.upstream.url {
            self.upstream.url.clone_from(url);
        }
        if let Some(key) = &file.upstream.api_key {
            self.upstream.api_key = Some(SecretString::from(key.clone()));
        }
        if let Some(keyterms) = &file.upstream.keyterms {
            self.upstream.keyterms.clone_from(keyterms);
        }
        if let Some(url) = &file.session.relay_url {
            self.relay_url.clone_from(url);
        }
        if let Some(ms) = file.navigation.debounce_ms {
            self.navigation.debounce_ms = ms;
        }
        if let Some(phrases) = &file.navigation.back_phrases {
            self.navigation.back_phrases.clone_from(phrases);
        }
        if let Some(question_mode) = file.navigation.question_mode {
            self.navigation.question_mode = question_mode;
        }
    }

    /// Apply `PODIUM_*` environment overrides
    fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var("PODIUM_BIND") {
            self.bind = bind;
        }
        if let Some(port) = env_parse("PODIUM_PORT") {
            self.port = port;
        }
        if let Ok(url) = std::env::var("PODIUM_UPSTREAM_URL") {
            self.upstream.url = url;
        }
        if let Ok(key) = std::env::var("PODIUM_UPSTREAM_API_KEY") {
            if !key.is_empty() {
                self.upstream.api_key = Some(SecretString::from(key));
            }
        }
        if let Ok(url) = std::env::var("PODIUM_RELAY_URL") {
            self.relay_url = url;
        }
        if let Some(ms) = env_parse("PODIUM_DEBOUNCE_MS") {
            self.navigation.debounce_ms = ms;
        }
        if let Ok(v) = std::env::var("PODIUM_QUESTION_MODE") {
            self.navigation.question_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }
}

/// Parse an environment variable, ignoring absent or malformed values
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Default config file location (`~/.config/podium/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "podium", "podium")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    relay: RelayFileConfig,

    #[serde(default)]
    upstream: UpstreamFileConfig,

    #[serde(default)]
    session: SessionFileConfig,

    #[serde(default)]
    navigation: NavigationFileConfig,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
struct RelayFileConfig {
    bind: Option<String>,
    port: Option<u16>,
}

/// Upstream transcription service configuration
#[derive(Debug, Default, Deserialize)]
struct UpstreamFileConfig {
    url: Option<String>,
    api_key: Option<String>,
    keyterms: Option<Vec<String>>,
}

/// Capture-session configuration
#[derive(Debug, Default, Deserialize)]
struct SessionFileConfig {
    relay_url: Option<String>,
}

/// Navigation tunables
#[derive(Debug, Default, Deserialize)]
struct NavigationFileConfig {
    debounce_ms: Option<u64>,
    back_phrases: Option<Vec<String>>,
    question_mode: Option<bool>,
}
