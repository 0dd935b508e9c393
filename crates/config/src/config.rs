//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Timing of the startup head start and the sequential retry rounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Pause before any file-backed job is attempted (default 10 ms)
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Fixed pause between sequential retry rounds (default 100 ms)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Maximum number of sequential rounds (default 5)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_startup_delay_ms() -> u64 {
    10
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_max_rounds() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_rounds: default_max_rounds(),
        }
    }
}

/// Worker pool configuration for parallel mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PoolConfig {
    /// Pool size (0 = one worker per logical CPU)
    #[serde(default)]
    pub workers: u32,
}

/// Moving-average engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    /// Recompute the running sum from the window every N samples (0 = never)
    #[serde(default)]
    pub resum_interval: u64,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - MOVAVG_STARTUP_DELAY_MS -> retry.startup_delay_ms
    /// - MOVAVG_RETRY_INTERVAL_MS -> retry.retry_interval_ms
    /// - MOVAVG_MAX_ROUNDS -> retry.max_rounds
    /// - MOVAVG_WORKERS -> pool.workers
    /// - MOVAVG_RESUM_INTERVAL -> engine.resum_interval
    ///
    /// Values that do not parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_parse::<u64>("MOVAVG_STARTUP_DELAY_MS") {
            self.retry.startup_delay_ms = ms;
        }

        if let Some(ms) = env_parse::<u64>("MOVAVG_RETRY_INTERVAL_MS") {
            self.retry.retry_interval_ms = ms;
        }

        if let Some(rounds) = env_parse::<u32>("MOVAVG_MAX_ROUNDS") {
            self.retry.max_rounds = rounds;
        }

        if let Some(workers) = env_parse::<u32>("MOVAVG_WORKERS") {
            self.pool.workers = workers;
        }

        if let Some(interval) = env_parse::<u64>("MOVAVG_RESUM_INTERVAL") {
            self.engine.resum_interval = interval;
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse().ok())
}
