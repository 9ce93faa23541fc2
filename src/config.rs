//! Configuration management for Bundle Tracker

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::hash::EnginePreference;
use crate::manifest::ExtensionAllowList;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub selection: SelectionConfig,
    pub hashing: HashingConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// e.g. `http://localhost:8000`
    pub base_url: String,
    /// Route prefix of the bundle endpoints, e.g. `bval`
    pub route_prefix: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Comma separated, case-insensitive
    pub allowed_extensions: String,
}

impl SelectionConfig {
    pub fn allow_list(&self) -> ExtensionAllowList {
        ExtensionAllowList::parse(&self.allowed_extensions)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub engine: EnginePreference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Consecutive failed polls that end a session
    pub max_consecutive_errors: u32,
    /// Hard ceiling on a session's lifetime
    pub lifetime_hours: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_hours.saturating_mul(3600))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_secs: 10,
            max_consecutive_errors: 5,
            lifetime_hours: 24,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                base_url: "http://localhost:8000".to_string(),
                route_prefix: "bval".to_string(),
                request_timeout_secs: 30,
            },
            selection: SelectionConfig {
                allowed_extensions: ".csv,.idat".to_string(),
            },
            hashing: HashingConfig {
                engine: EnginePreference::Auto,
            },
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                base_url: env::var("BUNDLE_SERVER_URL").unwrap_or(defaults.server.base_url),
                route_prefix: env::var("BUNDLE_ROUTE_PREFIX").unwrap_or(defaults.server.route_prefix),
                request_timeout_secs: parse_var(
                    "HTTP_TIMEOUT_SECS",
                    defaults.server.request_timeout_secs,
                )?,
            },
            selection: SelectionConfig {
                allowed_extensions: env::var("BUNDLE_ALLOWED_EXTENSIONS")
                    .unwrap_or(defaults.selection.allowed_extensions),
            },
            hashing: HashingConfig {
                engine: match env::var("HASH_ENGINE") {
                    Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                        name: "HASH_ENGINE",
                        value,
                    })?,
                    Err(_) => defaults.hashing.engine,
                },
            },
            polling: PollingConfig {
                interval_secs: parse_var("POLL_INTERVAL_SECS", defaults.polling.interval_secs)?,
                max_consecutive_errors: parse_var(
                    "MAX_CONSECUTIVE_ERRORS",
                    defaults.polling.max_consecutive_errors,
                )?,
                lifetime_hours: parse_var("SESSION_LIFETIME_HOURS", defaults.polling.lifetime_hours)?,
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
