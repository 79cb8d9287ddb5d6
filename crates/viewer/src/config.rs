//! Configuration for the PinPort viewer.
//!
//! TOML-based configuration loaded from `~/.config/pinport/viewer.toml`.
//! Environment variables override file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_client::{RelayEndpoints, DEFAULT_REGISTRATION_URL, DEFAULT_SOCKET_URL};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("{0}")]
    InvalidEndpoints(String),
}

/// Main configuration for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ViewerConfig {
    /// General viewer settings.
    pub general: GeneralConfig,

    /// Relay endpoint settings.
    pub relay: RelayConfig,
}

/// General viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the session slot.
    pub data_dir: PathBuf,

    /// Where downloaded files are saved.
    pub download_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Relay endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the relay's REST endpoints.
    pub registration_url: String,

    /// Base URL of the relay's channel upgrades.
    pub socket_url: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pinport"),
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pinport"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            registration_url: DEFAULT_REGISTRATION_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinport")
        .join("viewer.toml")
}

impl ViewerConfig {
    /// Loads the configuration from the given path, or returns defaults when
    /// the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// Supported variables: `PINPORT_RELAY_URL`, `PINPORT_SOCKET_URL`,
    /// `PINPORT_LOG_LEVEL`, `PINPORT_DOWNLOAD_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PINPORT_RELAY_URL") {
            if !url.is_empty() {
                self.relay.registration_url = url;
            }
        }
        if let Ok(url) = std::env::var("PINPORT_SOCKET_URL") {
            if !url.is_empty() {
                self.relay.socket_url = url;
            }
        }
        if let Ok(level) = std::env::var("PINPORT_LOG_LEVEL") {
            if !level.is_empty() {
                self.general.log_level = level;
            }
        }
        if let Ok(dir) = std::env::var("PINPORT_DOWNLOAD_DIR") {
            if !dir.is_empty() {
                self.general.download_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.general.log_level.clone()));
        }
        self.endpoints()
            .validate()
            .map_err(|e| ConfigError::InvalidEndpoints(e.to_string()))?;
        Ok(())
    }

    /// The relay endpoints this configuration names.
    pub fn endpoints(&self) -> RelayEndpoints {
        RelayEndpoints {
            registration_base_url: self.relay.registration_url.clone(),
            socket_base_url: self.relay.socket_url.clone(),
        }
    }

    /// Path of the persisted session slot.
    pub fn session_path(&self) -> PathBuf {
        self.general.data_dir.join("viewer_session.json")
    }
}
