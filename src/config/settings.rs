//! Configuration settings for cradlesync.
//!
//! Settings are loaded from `~/.cradlesync/config.yaml`. Every field has a
//! default, so a partial file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::Error;
use crate::sync::{Backoff, RetryPolicy, DEFAULT_MAX_RETRIES};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Sync engine settings.
    pub sync: SyncConfig,
    /// Backend API settings.
    pub remote: RemoteConfig,
    /// Connectivity probe settings.
    pub connectivity: ConnectivityConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Failures tolerated before a change is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds between scheduled passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Per-change exponential backoff.
    pub backoff: BackoffConfig,
}

/// Backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackoffConfig {
    /// Enable backoff between attempts of the same change.
    pub enabled: bool,
    /// Delay after the first failure, in seconds.
    #[serde(default = "default_backoff_base")]
    pub base_secs: u32,
    /// Maximum delay, in seconds.
    #[serde(default = "default_backoff_max")]
    pub max_secs: u32,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Connectivity probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Path under `remote.base_url` that answers health checks.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
    /// Seconds between probes.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions for serde
const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_backoff_base() -> u32 {
    5
}

const fn default_backoff_max() -> u32 {
    300
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_probe_path() -> String {
    "health".to_string()
}

const fn default_probe_interval() -> u64 {
    30
}

fn default_log_filter() -> String {
    "cradlesync=info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_secs: default_interval_secs(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_secs: default_backoff_base(),
            max_secs: default_backoff_max(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_path: default_probe_path(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl SyncConfig {
    /// Retry policy described by these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = self.backoff.enabled.then(|| Backoff {
            base: chrono::Duration::seconds(i64::from(self.backoff.base_secs)),
            max: chrono::Duration::seconds(i64::from(self.backoff.max_secs)),
        });
        RetryPolicy {
            max_retries: self.max_retries,
            backoff,
        }
    }

    /// Interval between scheduled passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl RemoteConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, Error> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), Error> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be positive".to_string()));
        }
        if self.connectivity.probe_interval_secs == 0 {
            return Err(Error::Config(
                "connectivity.probe_interval_secs must be positive".to_string(),
            ));
        }
        if self.sync.backoff.base_secs > self.sync.backoff.max_secs {
            return Err(Error::Config(
                "sync.backoff.base_secs must not exceed max_secs".to_string(),
            ));
        }
        if !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "remote.base_url must be an http(s) URL, got {}",
                self.remote.base_url
            )));
        }
        Ok(())
    }

    /// URL probed for connectivity.
    #[must_use]
    pub fn probe_url(&self) -> String {
        format!(
            "{}/{}",
            self.remote.base_url.trim_end_matches('/'),
            self.connectivity.probe_path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.interval_secs, 300);
        assert!(!config.sync.backoff.enabled);
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.logging.filter, "cradlesync=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = Config::default();
        config.sync.max_retries = 8;
        config.remote.auth_token = Some("secret".to_string());

        config.save_to_path(&config_path).unwrap();
        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(loaded.sync.max_retries, 8);
        assert_eq!(loaded.remote.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let partial_yaml = r"
sync:
  backoff:
    enabled: true
remote:
  base_url: https://api.example.com/v1/
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();

        assert!(config.sync.backoff.enabled);
        assert_eq!(config.sync.backoff.base_secs, 5);
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.probe_url(), "https://api.example.com/v1/health");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync:\n  interval_secs: 0\n").unwrap();

        assert!(matches!(
            Config::load_from_path(&config_path),
            Err(Error::Config(_))
        ));

        let mut config = Config::default();
        config.remote.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = SyncConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());

        config.backoff.enabled = true;
        config.backoff.base_secs = 2;
        let policy = config.retry_policy();
        assert_eq!(
            policy.backoff.map(|b| b.base),
            Some(chrono::Duration::seconds(2))
        );
    }
}
