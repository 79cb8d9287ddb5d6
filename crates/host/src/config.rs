//! Configuration for the PinPort host.
//!
//! TOML-based configuration loaded from `~/.config/pinport/host.toml`.
//! Environment variables override file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_client::{RelayEndpoints, DEFAULT_REGISTRATION_URL, DEFAULT_SOCKET_URL};

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("{0}")]
    InvalidEndpoints(String),
}

/// Main configuration for the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HostConfig {
    /// General host settings.
    pub general: GeneralConfig,

    /// Relay endpoint settings.
    pub relay: RelayConfig,
}

/// General host settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the session slot and log files.
    pub data_dir: PathBuf,

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
            data_dir: default_data_dir(),
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
        .join("host.toml")
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinport")
}

impl HostConfig {
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
    /// `PINPORT_LOG_LEVEL`.
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
        self.general.data_dir.join("host_session.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = HostConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.toml");
        fs::write(
            &path,
            r#"
[relay]
registration_url = "http://localhost:9000"
socket_url = "ws://localhost:9000"
"#,
        )
        .unwrap();

        let config = HostConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.relay.registration_url, "http://localhost:9000");
        // Unspecified sections fall back to defaults.
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = HostConfig::default();
        config.general.log_level = "verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_endpoints() {
        let mut config = HostConfig::default();
        config.relay.socket_url = "http://not-a-socket".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoints(_))
        ));
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = HostConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: HostConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
