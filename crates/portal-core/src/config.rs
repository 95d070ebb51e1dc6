//! Application configuration management.
//!
//! This module handles loading and saving the portal configuration: token
//! lifetime, password policy, simulated latency, the expiry check interval
//! and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/intranet-portal/config.json`;
//! session storage lives under the platform data directory.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::manager::{
    DEFAULT_LATENCY_MAX_MS, DEFAULT_LATENCY_MIN_MS, DEFAULT_MIN_PASSWORD_LENGTH,
    DEFAULT_TOKEN_TTL_HOURS,
};
use crate::auth::{Latency, SessionSettings};
use crate::context::DEFAULT_EXPIRY_CHECK_INTERVAL;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "intranet-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token_ttl_hours: i64,
    pub min_password_length: usize,
    pub simulate_latency: bool,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    pub expiry_check_interval_secs: u64,
    pub last_email: Option<String>,
    /// Overrides the platform data directory for session storage
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            simulate_latency: true,
            latency_min_ms: DEFAULT_LATENCY_MIN_MS,
            latency_max_ms: DEFAULT_LATENCY_MAX_MS,
            expiry_check_interval_secs: DEFAULT_EXPIRY_CHECK_INTERVAL.as_secs(),
            last_email: None,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_json(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Parse config JSON; missing keys take their defaults
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config file")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session storage file
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            token_ttl: Duration::hours(self.token_ttl_hours.max(1)),
            min_password_length: self.min_password_length.max(DEFAULT_MIN_PASSWORD_LENGTH),
            latency: self
                .simulate_latency
                .then(|| Latency::from_millis(self.latency_min_ms, self.latency_max_ms)),
        }
    }

    pub fn expiry_check_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.expiry_check_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_policy() {
        let config = Config::default();
        let settings = config.session_settings();
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(config.expiry_check_interval(), StdDuration::from_secs(60));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json(r#"{"simulate_latency": false, "last_email": "user@example.com"}"#)
            .unwrap();
        assert!(!config.simulate_latency);
        assert_eq!(config.last_email.as_deref(), Some("user@example.com"));
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.session_settings().latency, None);
    }

    #[test]
    fn test_interval_and_ttl_are_clamped() {
        let config = Config {
            token_ttl_hours: 0,
            expiry_check_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.session_settings().token_ttl, Duration::hours(1));
        assert_eq!(config.expiry_check_interval(), StdDuration::from_secs(1));
    }

    #[test]
    fn test_password_minimum_cannot_be_lowered() {
        let config = Config::from_json(r#"{"min_password_length": 2}"#).unwrap();
        assert_eq!(config.session_settings().min_password_length, 6);

        let stricter = Config::from_json(r#"{"min_password_length": 10}"#).unwrap();
        assert_eq!(stricter.session_settings().min_password_length, 10);
    }

    #[test]
    fn test_data_dir_override() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/portal")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/portal"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Config::from_json("{ nope").is_err());
    }
}
