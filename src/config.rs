// src/config.rs

//! Manages engine configuration: defaults, TOML loading and validation.

use crate::core::SyncsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

fn default_path() -> String {
    "/syncs".to_string()
}

fn default_close_timeout() -> Duration {
    Duration::from_millis(10_000)
}

/// Engine configuration.
///
/// All fields have defaults, so an empty TOML document (or
/// `Config::default()`) yields a working configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// The serving path the embedding HTTP/WebSocket listener should mount
    /// the engine on. The engine itself never inspects it; it is carried
    /// here so the whole deployment reads from one file.
    #[serde(default = "default_path")]
    pub path: String,

    /// Grace period after a transport drop during which a client may
    /// reconnect before it is permanently removed.
    #[serde(default = "default_close_timeout", with = "humantime_serde")]
    pub close_timeout: Duration,

    /// Enables the verbose protocol dump (every inbound and outbound
    /// command). Diagnostic only; protocol behavior is unaffected.
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: default_path(),
            close_timeout: default_close_timeout(),
            debug: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, SyncsError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SyncsError::Config(format!("failed to read config file '{path}': {e}")))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| SyncsError::Config(format!("failed to parse TOML from '{path}': {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), SyncsError> {
        if self.path.is_empty() || !self.path.starts_with('/') {
            return Err(SyncsError::Config(format!(
                "'path' must be an absolute URL path, got '{}'",
                self.path
            )));
        }
        if self.close_timeout.is_zero() {
            return Err(SyncsError::Config(
                "'close_timeout' must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.path, "/syncs");
        assert_eq!(config.close_timeout, Duration::from_millis(10_000));
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.path, "/syncs");
        assert_eq!(config.close_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn humantime_close_timeout() {
        let config: Config = toml::from_str("close_timeout = \"30s\"").unwrap();
        assert_eq!(config.close_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_relative_path() {
        let config: Config = toml::from_str("path = \"syncs\"").unwrap();
        assert!(config.validate().is_err());
    }
}
