// ============================================
// File: crates/lanspeed-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the speed-test server,
//! loaded from a TOML file with every field defaulted.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - `TestParams`: the subset a session needs, in runtime units
//!
//! ## Configuration Sections
//! - `network`: WebSocket listen address
//! - `speed_test`: Chunking, durations, timers, estimator window
//! - `limits`: Concurrent session cap
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:3000"
//!
//! [speed_test]
//! chunk_size = 1048576
//! upload_duration_ms = 10000
//! download_duration_ms = 10000
//! progress_interval_ms = 100
//! fill_method = "zero"
//! watchdog_grace_ms = 5000
//! window_size = 10
//! settle_delay_ms = 1000
//! max_speed_mbps = 125.0
//!
//! [limits]
//! max_sessions = 256
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - The watchdog grace has a hard floor of 5 s so a slow peer is
//!   never cut off before its last ack can arrive
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use lanspeed_common::time::millis;
use lanspeed_common::Direction;
use lanspeed_core::measure::BYTES_PER_MEGABYTE;
use lanspeed_core::FillMethod;

use crate::error::{Result, ServerError};

/// Smallest accepted watchdog grace period.
pub const MIN_WATCHDOG_GRACE_MS: u64 = 5_000;

/// Download volume headroom over the configured ceiling.
const DOWNLOAD_HEADROOM: f64 = 1.5;

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Measurement parameters.
    #[serde(default)]
    pub speed_test: SpeedTestConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.speed_test.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns listen address.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        self.network.listen_addr
    }

    /// Returns max sessions.
    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.limits.max_sessions
    }

    /// Session parameters for `direction`.
    #[must_use]
    pub fn test_params(&self, direction: Direction) -> TestParams {
        self.speed_test.params(direction)
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// WebSocket listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "network.listen_addr",
                "port cannot be 0",
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// SpeedTestConfig
// ============================================

/// Measurement configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedTestConfig {
    /// Download chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Upload test length in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub upload_duration_ms: u64,

    /// Download test length in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub download_duration_ms: u64,

    /// Progress event cadence in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Filler for download chunks.
    #[serde(default)]
    pub fill_method: FillMethod,

    /// Extra time after the test duration before the watchdog fires.
    #[serde(default = "default_watchdog_grace_ms")]
    pub watchdog_grace_ms: u64,

    /// Sliding-window size of the live speed estimator.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Pause between the upload and download legs of a composite test.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Fastest link the download volume is sized for, in MB/s.
    #[serde(default = "default_max_speed_mbps")]
    pub max_speed_mbps: f64,
}

fn default_chunk_size() -> usize {
    lanspeed_core::measure::DEFAULT_CHUNK_SIZE
}

fn default_duration_ms() -> u64 {
    10_000
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_watchdog_grace_ms() -> u64 {
    MIN_WATCHDOG_GRACE_MS
}

fn default_window_size() -> usize {
    lanspeed_core::measure::DEFAULT_WINDOW_SIZE
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_max_speed_mbps() -> f64 {
    125.0
}

impl SpeedTestConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ServerError::config_invalid(
                "speed_test.chunk_size",
                "must be greater than 0",
            ));
        }

        if self.upload_duration_ms == 0 || self.download_duration_ms == 0 {
            return Err(ServerError::config_invalid(
                "speed_test.*_duration_ms",
                "must be greater than 0",
            ));
        }

        if self.progress_interval_ms == 0 {
            return Err(ServerError::config_invalid(
                "speed_test.progress_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.watchdog_grace_ms < MIN_WATCHDOG_GRACE_MS {
            return Err(ServerError::config_invalid(
                "speed_test.watchdog_grace_ms",
                format!("must be at least {MIN_WATCHDOG_GRACE_MS}"),
            ));
        }

        if self.window_size == 0 {
            return Err(ServerError::config_invalid(
                "speed_test.window_size",
                "must be greater than 0",
            ));
        }

        if !(self.max_speed_mbps.is_finite() && self.max_speed_mbps > 0.0) {
            return Err(ServerError::config_invalid(
                "speed_test.max_speed_mbps",
                "must be a positive number",
            ));
        }

        Ok(())
    }

    /// Bytes a download session may send before its generator runs dry.
    ///
    /// `max_speed × 1 MiB × duration_s × 1.5`
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn download_total_bytes(&self) -> u64 {
        let seconds = self.download_duration_ms as f64 / 1_000.0;
        (self.max_speed_mbps * BYTES_PER_MEGABYTE * seconds * DOWNLOAD_HEADROOM) as u64
    }

    /// Session parameters for `direction`.
    #[must_use]
    pub fn params(&self, direction: Direction) -> TestParams {
        let duration_ms = match direction {
            Direction::Upload => self.upload_duration_ms,
            Direction::Download => self.download_duration_ms,
        };
        TestParams {
            direction,
            duration: millis(duration_ms),
            grace: millis(self.watchdog_grace_ms),
            progress_interval: millis(self.progress_interval_ms),
            chunk_size: self.chunk_size,
            fill_method: self.fill_method,
            window_size: self.window_size,
            download_total_bytes: self.download_total_bytes(),
        }
    }

    /// Pause between composite legs.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        millis(self.settle_delay_ms)
    }
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            upload_duration_ms: default_duration_ms(),
            download_duration_ms: default_duration_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            fill_method: FillMethod::default(),
            watchdog_grace_ms: default_watchdog_grace_ms(),
            window_size: default_window_size(),
            settle_delay_ms: default_settle_delay_ms(),
            max_speed_mbps: default_max_speed_mbps(),
        }
    }
}

// ============================================
// TestParams
// ============================================

/// Everything one session needs, in runtime units.
#[derive(Debug, Clone)]
pub struct TestParams {
    /// Leg direction.
    pub direction: Direction,
    /// Test length.
    pub duration: Duration,
    /// Watchdog grace after `duration`.
    pub grace: Duration,
    /// Progress cadence.
    pub progress_interval: Duration,
    /// Download chunk size.
    pub chunk_size: usize,
    /// Download filler.
    pub fill_method: FillMethod,
    /// Estimator window.
    pub window_size: usize,
    /// Download generator volume.
    pub download_total_bytes: u64,
}

impl TestParams {
    /// Time after start at which the watchdog fires.
    #[must_use]
    pub fn watchdog_after(&self) -> Duration {
        self.duration + self.grace
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrently registered sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    256
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_sessions",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 3000);
        assert_eq!(config.speed_test.chunk_size, 1_048_576);
        assert_eq!(config.speed_test.fill_method, FillMethod::Zero);
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [network]
            listen_addr = "127.0.0.1:8080"

            [speed_test]
            chunk_size = 65536
            upload_duration_ms = 5000
            download_duration_ms = 8000
            progress_interval_ms = 250
            fill_method = "random"
            watchdog_grace_ms = 6000
            window_size = 20
            settle_delay_ms = 500
            max_speed_mbps = 10.0

            [limits]
            max_sessions = 8

            [logging]
            level = "debug"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.speed_test.fill_method, FillMethod::Random);
        assert_eq!(config.max_sessions(), 8);

        let params = config.test_params(Direction::Download);
        assert_eq!(params.duration, Duration::from_secs(8));
        assert_eq!(params.watchdog_after(), Duration::from_secs(14));
        assert_eq!(params.window_size, 20);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ServerConfig::from_str("[speed_test]\nchunk_size = 1024\n").unwrap();
        assert_eq!(config.speed_test.chunk_size, 1024);
        assert_eq!(config.speed_test.upload_duration_ms, 10_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_grace_floor() {
        let err = ServerConfig::from_str("[speed_test]\nwatchdog_grace_ms = 1000\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(ServerConfig::from_str("[speed_test]\nchunk_size = 0\n").is_err());
        assert!(ServerConfig::from_str("[speed_test]\nwindow_size = 0\n").is_err());
        assert!(ServerConfig::from_str("[limits]\nmax_sessions = 0\n").is_err());
        assert!(ServerConfig::from_str("[speed_test]\nfill_method = \"ones\"\n").is_err());
    }

    #[test]
    fn test_download_volume() {
        let config = SpeedTestConfig {
            max_speed_mbps: 2.0,
            download_duration_ms: 1_000,
            ..SpeedTestConfig::default()
        };
        assert_eq!(config.download_total_bytes(), 3 * 1_048_576);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ServerConfig::default();
        let parsed = ServerConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.listen_addr(), config.listen_addr());
        assert_eq!(parsed.speed_test.window_size, config.speed_test.window_size);
    }
}
