use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

pub const CONTAINER_NAME_ENV: &str = "REDIS_CONTAINER_NAME";
pub const REDIS_URL_ENV: &str = "REDIS_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Name of the Redis container to watch (default: "redis")
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Seconds between two checks of the background loop (default: 30)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Unpause a paused container automatically (default: true)
    #[serde(default = "default_true")]
    pub auto_recovery: bool,
    /// Time given to the runtime to apply an unpause before re-reading
    /// the status (default: 1000)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Delay before the single retry of `ensure_available` (default: 2000)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Number of log lines inspected by the security scan (default: 50)
    #[serde(default = "default_log_tail")]
    pub log_tail: usize,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Falls back to `REDIS_URL` when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_cache_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_cache_timeout")]
    pub read_timeout_secs: u64,
}

fn default_container_name() -> String {
    "redis".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_log_tail() -> usize {
    50
}

fn default_cache_timeout() -> u64 {
    5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: default_cache_timeout(),
            read_timeout_secs: default_cache_timeout(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            container_name: default_container_name(),
            poll_interval_secs: default_poll_interval(),
            auto_recovery: default_true(),
            settle_delay_ms: default_settle_delay(),
            retry_delay_ms: default_retry_delay(),
            log_tail: default_log_tail(),
            cache: CacheConfig::default(),
        }
    }
}

impl WatchdogConfig {
    /// Load the config file at `path`. A missing file yields the defaults.
    /// Environment overrides are applied and the result is validated.
    pub fn try_init(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::try_init_from_string(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn try_init_from_string(val: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(val)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(CONTAINER_NAME_ENV).filter(|n| !n.trim().is_empty()) {
            self.container_name = name;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "container_name must not be empty".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.connect_timeout_secs == 0 || self.cache.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl CacheConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
