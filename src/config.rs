// SPDX-License-Identifier: PMPL-1.0-or-later
//! Configuration for contrastbot
//!
//! Loaded from an optional TOML file. Every section falls back to its
//! defaults, and the CLI overrides individual fields after loading.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive host connection
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Retry and backoff limits for archive requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool and result store
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the archive host; the record filename is appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single range request (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Sub-second timeout; takes precedence over `timeout_secs` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            timeout_ms: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ArchiveConfig {
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_base_url() -> String {
    "https://data.commoncrawl.org".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("contrastbot/", env!("CARGO_PKG_VERSION"), " (accessibility research)").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per archive request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_max_attempts() -> usize {
    4
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent domain workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Delay each worker waits before its archive request (milliseconds)
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    /// Skip domains already recorded as ok or parse_empty
    #[serde(default)]
    pub resume: bool,

    /// Root of the result store
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            delay_ms: default_delay(),
            resume: false,
            output_dir: default_output_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_workers() -> usize {
    8
}

fn default_delay() -> u64 {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Config {
    /// Load configuration from a TOML file, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(Error::Config("pipeline.workers must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::Config("retry.multiplier must be >= 1.0".to_string()));
        }
        if self.archive.base_url.trim().is_empty() {
            return Err(Error::Config("archive.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}
