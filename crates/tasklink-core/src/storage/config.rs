//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Calendar mirroring settings (time zone, request timeout)
//! - The local account id used to key todos and grants
//! - OAuth redirect port for the loopback consent flow
//!
//! Configuration is stored at `~/.config/tasklink/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Calendar mirroring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA time zone name attached to mirrored events.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Per-request timeout for calendar API calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Local account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Owner id under which todos and the calendar grant are stored.
    #[serde(default = "default_user")]
    pub user: String,
}

/// OAuth client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// Loopback port for the authorization-code callback.
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/tasklink/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub oauth: OAuthClientConfig,
}

// Default functions
fn default_time_zone() -> String {
    "UTC".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_user() -> String {
    "local".to_string()
}
fn default_redirect_port() -> u16 {
    19824
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            redirect_port: default_redirect_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            account: AccountConfig::default(),
            oauth: OAuthClientConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/tasklink"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, writing defaults if no file exists yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default configuration cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load the configuration, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist the configuration to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or the filesystem write fails.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.calendar.time_zone, "UTC");
        assert_eq!(parsed.calendar.request_timeout_secs, 30);
        assert_eq!(parsed.account.user, "local");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[calendar]\ntime_zone = \"Asia/Kolkata\"\n").unwrap();
        assert_eq!(parsed.calendar.time_zone, "Asia/Kolkata");
        assert_eq!(parsed.calendar.request_timeout_secs, 30);
        assert_eq!(parsed.account.user, "local");
        assert_eq!(parsed.oauth.redirect_port, 19824);
    }
}
