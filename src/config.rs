// Configuration File Support
//
// TOML configuration for the webhook relay, with environment variable
// overrides applied on top of the file and validation applied last.

use crate::webhooks::retry::RetrySettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Retry and transport settings
    pub delivery: DeliveryConfig,

    /// Work queue sizing
    pub queue: QueueConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Convert the level string to a `tracing::Level`
    pub fn level(&self) -> Result<tracing::Level> {
        self.level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Attempts per payload, always run in full
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_backoff_ms: u64,

    /// Ceiling for the doubling backoff
    pub max_backoff_ms: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            request_timeout_secs: 10,
        }
    }
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded queue capacity
    pub capacity: usize,

    /// Number of delivery workers sharing the queue
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            workers: 1,
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults (with environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, validated
    pub fn from_env() -> Result<Self> {
        let config = Self::default().apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over config file values:
    /// - WEBHOOK_RELAY_LOG_LEVEL
    /// - WEBHOOK_RELAY_LOG_FORMAT
    /// - WEBHOOK_RELAY_MAX_ATTEMPTS
    /// - WEBHOOK_RELAY_INITIAL_BACKOFF_MS
    /// - WEBHOOK_RELAY_MAX_BACKOFF_MS
    /// - WEBHOOK_RELAY_REQUEST_TIMEOUT_SECS
    /// - WEBHOOK_RELAY_QUEUE_CAPACITY
    /// - WEBHOOK_RELAY_WORKERS
    ///
    /// Values that do not parse are ignored.
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("WEBHOOK_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WEBHOOK_RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(attempts) = env_parse("WEBHOOK_RELAY_MAX_ATTEMPTS") {
            self.delivery.max_attempts = attempts;
        }
        if let Some(ms) = env_parse("WEBHOOK_RELAY_INITIAL_BACKOFF_MS") {
            self.delivery.initial_backoff_ms = ms;
        }
        if let Some(ms) = env_parse("WEBHOOK_RELAY_MAX_BACKOFF_MS") {
            self.delivery.max_backoff_ms = ms;
        }
        if let Some(secs) = env_parse("WEBHOOK_RELAY_REQUEST_TIMEOUT_SECS") {
            self.delivery.request_timeout_secs = secs;
        }

        if let Some(capacity) = env_parse("WEBHOOK_RELAY_QUEUE_CAPACITY") {
            self.queue.capacity = capacity;
        }
        if let Some(workers) = env_parse("WEBHOOK_RELAY_WORKERS") {
            self.queue.workers = workers;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        let delivery = &self.delivery;
        if delivery.max_attempts == 0 || delivery.max_attempts > 20 {
            anyhow::bail!("max_attempts must be between 1 and 20");
        }
        if delivery.initial_backoff_ms == 0 {
            anyhow::bail!("initial_backoff_ms must be > 0");
        }
        if delivery.max_backoff_ms < delivery.initial_backoff_ms {
            anyhow::bail!("max_backoff_ms must be >= initial_backoff_ms");
        }
        if delivery.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }

        if self.queue.capacity == 0 {
            anyhow::bail!("Queue capacity must be > 0");
        }
        if self.queue.workers == 0 || self.queue.workers > 64 {
            anyhow::bail!("Worker count must be between 1 and 64");
        }

        Ok(())
    }

    /// Retry settings derived from the delivery section
    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings::new(
            self.delivery.max_attempts,
            Duration::from_millis(self.delivery.initial_backoff_ms),
            Duration::from_millis(self.delivery.max_backoff_ms),
        )
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
