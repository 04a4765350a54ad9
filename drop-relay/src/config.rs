//! Configuration loading for drop-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every section and field is optional; an empty file yields
//! [`Config::default`].

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for drop-relay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Rate limiting configuration.
    pub limits: LimitsConfig,
    /// Sweep task configuration.
    pub sweep: SweepConfig,
    /// Telemetry store configuration.
    pub telemetry: TelemetryConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for HTTP and WebSocket traffic (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// WebSocket upgrades per IP address per minute (default: 30).
    #[serde(default = "default_connections_per_minute")]
    pub connections_per_minute: u32,
    /// Session creations per IP address per minute (default: 10).
    #[serde(default = "default_sessions_per_minute")]
    pub sessions_per_minute: u32,
    /// Largest accepted WebSocket message in bytes (default: 2MB).
    /// A 1MB chunk plus header and seal overhead fits comfortably.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Sweep task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Sweep interval in seconds (default: 5).
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Enable sweep task (default: true).
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    /// How long a session nobody has joined yet is kept (default: 3600).
    #[serde(default = "default_unclaimed_ttl")]
    pub unclaimed_ttl_secs: u64,
    /// Cancel and delete sessions idle for this long (default: disabled).
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

/// Telemetry store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Record transfer events (default: true).
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_connections_per_minute() -> u32 {
    30
}

fn default_sessions_per_minute() -> u32 {
    10
}

fn default_max_frame_bytes() -> usize {
    2 * 1024 * 1024 // 2MB
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_unclaimed_ttl() -> u64 {
    60 * 60 // 1 hour
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("sealdrop.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connections_per_minute: default_connections_per_minute(),
            sessions_per_minute: default_sessions_per_minute(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            enabled: default_sweep_enabled(),
            unclaimed_ttl_secs: default_unclaimed_ttl(),
            idle_timeout_secs: None,
        }
    }
}

impl SweepConfig {
    /// Sweep period.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Grace period for sessions no peer has joined.
    pub fn unclaimed_ttl(&self) -> Duration {
        Duration::from_secs(self.unclaimed_ttl_secs)
    }

    /// Idle expiry, if enabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            database: default_database_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            return Ok(Self::from_file(path)?);
        }
        tracing::warn!("{} not found, using defaults", path.display());
        Ok(Self::default())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
