//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{RelayError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collector endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

/// Tracking behaviour configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    pub device_id: String,

    #[serde(default = "default_interval_s")]
    pub interval_s: u64,

    #[serde(default = "default_buffer")]
    pub buffer: bool,
}

/// Position queue configuration
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_queue_path")]
    pub path: String,

    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: usize,
}

/// Connectivity probe configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// GPS receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_gps_port")]
    pub port: String,

    #[serde(default = "default_gps_baud_rate")]
    pub baud_rate: u32,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for the log file; empty disables file logging
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_server_url() -> String { "http://localhost:5055".to_string() }

fn default_interval_s() -> u64 { 10 }
fn default_buffer() -> bool { true }

fn default_queue_path() -> String { "./data/positions.jsonl".to_string() }
fn default_compact_threshold() -> usize { 1000 }

fn default_probe_interval_ms() -> u64 { 5000 }
fn default_probe_timeout_ms() -> u64 { 3000 }

fn default_gps_port() -> String { "/dev/ttyACM0".to_string() }
fn default_gps_baud_rate() -> u32 { 9600 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { url: default_server_url() }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_queue_path(),
            compact_threshold: default_compact_threshold(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            port: default_gps_port(),
            baud_rate: default_gps_baud_rate(),
        }
    }
}

impl TrackingConfig {
    /// Transmission interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use track_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// println!("Reporting as {}", config.tracking.device_id);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(RelayError::Config(
                toml::de::Error::custom("server url cannot be empty")
            ));
        }

        // Plain HTTP is expected; HTTPS is allowed but unusual for the collector port
        if self.server.url.to_ascii_lowercase().starts_with("https://") {
            warn!("Server URL {} uses HTTPS, the collector normally listens on plain HTTP", self.server.url);
        }

        if self.tracking.device_id.trim().is_empty() {
            return Err(RelayError::Config(
                toml::de::Error::custom("tracking device_id cannot be empty")
            ));
        }

        if self.tracking.interval_s == 0 || self.tracking.interval_s > 86400 {
            return Err(RelayError::Config(
                toml::de::Error::custom("interval_s must be between 1 and 86400")
            ));
        }

        if self.queue.path.is_empty() {
            return Err(RelayError::Config(
                toml::de::Error::custom("queue path cannot be empty")
            ));
        }

        if self.queue.compact_threshold == 0 {
            return Err(RelayError::Config(
                toml::de::Error::custom("compact_threshold must be greater than 0")
            ));
        }

        if self.network.probe_interval_ms < 100 || self.network.probe_interval_ms > 600000 {
            return Err(RelayError::Config(
                toml::de::Error::custom("probe_interval_ms must be between 100 and 600000")
            ));
        }

        if self.network.probe_timeout_ms < 100 || self.network.probe_timeout_ms > 60000 {
            return Err(RelayError::Config(
                toml::de::Error::custom("probe_timeout_ms must be between 100 and 60000")
            ));
        }

        if self.gps.port.is_empty() {
            return Err(RelayError::Config(
                toml::de::Error::custom("gps port cannot be empty")
            ));
        }

        if ![4800, 9600, 19200, 38400, 57600, 115200].contains(&self.gps.baud_rate) {
            return Err(RelayError::Config(
                toml::de::Error::custom("gps baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200")
            ));
        }

        Ok(())
    }
}
