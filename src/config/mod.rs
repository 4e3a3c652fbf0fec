// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Configuration module

use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Use the simulated snapshot source instead of a backend
    pub demo_mode: bool,

    /// Snapshot backend
    pub source: SourceConfig,

    /// Poll intervals
    pub polling: PollingConfig,

    /// Freshness thresholds
    pub freshness: FreshnessConfig,

    /// Entity reconciliation
    pub reconciler: ReconcilerConfig,

    /// Reader health roll-up
    pub health: HealthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "TagWatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            demo_mode: false,
            source: SourceConfig::default(),
            polling: PollingConfig::default(),
            freshness: FreshnessConfig::default(),
            reconciler: ReconcilerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("tagwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Default tracing level when no verbosity flag is given
    pub fn tracing_level(&self) -> std::result::Result<Level, ConfigError> {
        self.log_level
            .trim()
            .parse::<Level>()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.tracing_level()?;
        self.source.validate()?;
        self.polling.validate()?;
        self.freshness.validate()?;

        if self.reconciler.history_limit == 0 {
            return Err(ConfigError::Zero { field: "reconciler.history_limit" });
        }
        if !(self.health.max_power > 0.0) {
            return Err(ConfigError::Zero { field: "health.max_power" });
        }
        Ok(())
    }
}

/// Snapshot backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Backend base URL
    pub base_url: String,

    pub live_tags_path: String,
    pub reader_status_path: String,
    pub activity_logs_path: String,
    pub item_search_path: String,
    pub live_summary_path: String,

    /// Per-request timeout; defaults to the poll interval of the target
    pub request_timeout_ms: Option<u64>,

    /// IANA zone of the local time printed in live-summary lines
    pub summary_timezone: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            live_tags_path: "/api/dashboard/live-tags/".to_string(),
            reader_status_path: "/api/readers/status/".to_string(),
            activity_logs_path: "/api/activity-logs/".to_string(),
            item_search_path: "/api/items/search/".to_string(),
            live_summary_path: "/rfid/live_summary/".to_string(),
            request_timeout_ms: None,
            summary_timezone: "Europe/Helsinki".to_string(),
        }
    }
}

impl SourceConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(self.base_url.clone()));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Zero { field: "source.request_timeout_ms" });
        }
        self.summary_tz()?;
        Ok(())
    }

    /// Zone used to read the naive local time of summary lines
    pub fn summary_tz(&self) -> std::result::Result<Tz, ConfigError> {
        self.summary_timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::TimeZone(self.summary_timezone.clone()))
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Request timeout for a target polled every `interval`
    pub fn timeout_for(&self, interval: Duration) -> Duration {
        self.request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(interval)
    }
}

/// Poll interval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Live tag snapshot interval in milliseconds
    pub tag_interval_ms: u64,

    /// Reader status snapshot interval in milliseconds
    pub reader_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tag_interval_ms: 5000,
            reader_interval_ms: 30000,
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.tag_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "polling.tag_interval_ms" });
        }
        if self.reader_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "polling.reader_interval_ms" });
        }
        Ok(())
    }

    pub fn tag_interval(&self) -> Duration {
        Duration::from_millis(self.tag_interval_ms)
    }

    pub fn reader_interval(&self) -> Duration {
        Duration::from_millis(self.reader_interval_ms)
    }
}

/// Freshness classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Ages up to this many seconds are fresh
    pub fresh_threshold_secs: u64,

    /// Ages up to this many seconds are warm, anything older is stale
    pub warm_threshold_secs: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            fresh_threshold_secs: 60,
            warm_threshold_secs: 600,
        }
    }
}

impl FreshnessConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.warm_threshold_secs < self.fresh_threshold_secs {
            return Err(ConfigError::ThresholdOrder {
                fresh: self.fresh_threshold_secs,
                warm: self.warm_threshold_secs,
            });
        }
        Ok(())
    }
}

/// Entity reconciliation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Maximum detection events kept per entity
    pub history_limit: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { history_limit: 20 }
    }
}

/// Reader health configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Antenna power ceiling of the reader hardware
    pub max_power: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { max_power: 31.0 }
    }
}
