use crate::constants;
use crate::error::{GeocodeError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_base_url() -> String {
    constants::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    constants::DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_seconds() -> u64 {
    constants::DEFAULT_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    constants::DEFAULT_MAX_RETRIES
}

fn default_rate_limit_ms() -> u64 {
    constants::DEFAULT_RATE_LIMIT_MS
}

fn default_db_path() -> String {
    constants::DEFAULT_DB_PATH.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load config.toml from the working directory, falling back to defaults
    /// when the file does not exist. Environment variables override the file.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                GeocodeError::Config(format!("Failed to read config file '{path}': {e}"))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(agent) = env::var("OSM_USER_AGENT") {
            self.provider.user_agent = agent;
        }
        if let Ok(url) = env::var("OSM_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Ok(ms) = env::var("OSM_RATE_LIMIT_MS") {
            if let Ok(parsed) = ms.parse() {
                self.provider.rate_limit_ms = parsed;
            }
        }
        if let Ok(path) = env::var("FLOOD_DB_PATH") {
            self.database.path = path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from("does-not-exist.toml").unwrap();
        assert_eq!(config.provider.rate_limit_ms, 1100);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.database.path, "flood_system.db");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("[provider]\nrate_limit_ms = 2000\n").unwrap();
        assert_eq!(config.provider.rate_limit_ms, 2000);
        assert_eq!(config.provider.base_url, "https://nominatim.openstreetmap.org");
    }
}
