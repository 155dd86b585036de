//! Pipeline configuration, loadable from TOML.
//!
//! Every tunable lives here with defaults: retry policy and pacing for
//! the downloader, the fill/coverage thresholds and transaction-cost
//! assumption for the cleaner, and the data directory. CLI flags override
//! individual fields after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(String),
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the artifact tree.
    pub data_dir: PathBuf,
    pub download: DownloadConfig,
    pub clean: CleanConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            download: DownloadConfig::default(),
            clean: CleanConfig::default(),
        }
    }
}

/// Download stage tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Retries after the first attempt, per ticker.
    pub max_retries: u32,
    /// Fixed delay between attempts for one ticker.
    pub retry_delay_ms: u64,
    /// Delay between ticker requests, regardless of outcome.
    pub request_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2_000,
            request_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl DownloadConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cleaning stage tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Missing-day fraction above which a ticker is flagged.
    pub max_missing_frac: f64,
    /// Minimum trading rows before a ticker is flagged as short history.
    pub min_history_days: usize,
    /// Fixed transaction-cost column value, basis points.
    pub transaction_cost_bps: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            max_missing_frac: 0.10,
            min_history_days: 252,
            transaction_cost_bps: 3.0,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn clean_options(&self) -> crate::data::clean::CleanOptions {
        crate::data::clean::CleanOptions {
            max_missing_frac: self.clean.max_missing_frac,
            min_history_days: self.clean.min_history_days,
            transaction_cost_bps: self.clean.transaction_cost_bps,
        }
    }
}
