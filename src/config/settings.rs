use super::env_overrides::apply_env_overrides;
use crate::error::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted search window, in minutes (30 days)
pub const MAX_WINDOW_MINUTES: u64 = 30 * 24 * 60;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub datadog: DatadogConfig,
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub paths: PathsConfig,
}

/// Credentials and site of the log search API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatadogConfig {
    pub site: String,
    pub api_key: String,
    pub app_key: String,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: "datadoghq.com".to_string(),
            api_key: String::new(),
            app_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Cycle timing and fetch limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub logs_window_minutes: u64,
    pub max_logs_per_query: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            logs_window_minutes: 5,
            max_logs_per_query: 500,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory the report is written to and served from
    pub data_dir: PathBuf,
    /// JSON file listing the monitored targets
    pub links_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            links_file: PathBuf::from("links.json"),
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string; missing keys take defaults
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::TomlError` if it is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    /// Build the effective configuration
    ///
    /// Starts from `path` (or defaults when absent or missing on disk), applies
    /// overrides from `lookup`, then validates the result.
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!(
                    "Configuration file '{}' not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            None => Self::default(),
        };

        apply_env_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration from the process environment
    pub fn from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(path, |key| std::env::var(key).ok())
    }

    /// Check the values that would make the monitor unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datadog.api_key.trim().is_empty() || self.datadog.app_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Missing DD_API_KEY or DD_APP_KEY".to_string(),
            ));
        }
        if self.datadog.site.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "datadog.site must not be empty".to_string(),
            ));
        }
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "polling.interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.polling.logs_window_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "polling.logs_window_minutes must be greater than 0".to_string(),
            ));
        }
        if self.polling.logs_window_minutes > MAX_WINDOW_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "polling.logs_window_minutes must be at most {}",
                MAX_WINDOW_MINUTES
            )));
        }
        Ok(())
    }
}
