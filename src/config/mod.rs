//! Configuration management for the propagator engine
//!
//! Configuration is a single JSON document loaded from a file path at boot.
//! Recognized sections: application metadata, scheduler jobs, the stock
//! catalogue that seeds scrape queues, and the Redis broker connection.
//! Worker pool registrations are supplied imperatively by the embedding
//! program, not read from this document.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Application metadata
    pub app: AppConfig,

    /// Job scheduling configuration
    pub scheduler: SchedulerConfig,

    /// Redis broker connection settings
    pub redis: RedisConfig,

    /// Master list of stocks to be tracked
    pub stock_list: StockList,
}

/// Application metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Application name, used in logs
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment tag (development, production, testing)
    #[serde(default)]
    pub env: String,
}

/// Scheduler configuration: the job catalogue and the global timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Per-run timeout applied to jobs that declare timeout 0, in seconds
    #[serde(default)]
    pub default_timeout: u64,

    /// Declared jobs; handlers are bound later by the embedding program
    pub jobs: Vec<JobConfig>,
}

impl SchedulerConfig {
    /// The global default timeout as a [`Duration`]; zero means no deadline
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }
}

/// A schedulable job declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Unique job name within the scheduler
    pub name: String,

    /// Six-field cron expression with seconds precision
    pub cron_expr: String,

    /// Per-run timeout in seconds; 0 inherits the scheduler default
    #[serde(default)]
    pub timeout: u64,

    /// Extra handler attempts on failure, with exponential backoff
    #[serde(default)]
    pub retry_count: u32,

    /// Disabled jobs are skipped at scheduler construction
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Free-form description, shown in status output
    #[serde(default)]
    pub description: String,
}

impl JobConfig {
    /// The per-run timeout as a [`Duration`]; zero means "inherit"
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Redis broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: default_pool_size(),
        }
    }
}

/// Master list of stocks to be tracked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockList {
    pub stocks: Vec<Stock>,
}

impl StockList {
    /// Iterate over the enabled stocks only
    pub fn enabled(&self) -> impl Iterator<Item = &Stock> {
        self.stocks.iter().filter(|s| s.enabled)
    }
}

/// A stock ticker to be tracked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    /// Ticker symbol (e.g., AAPL)
    pub symbol: String,

    /// Company name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Only enabled stocks are seeded onto queues
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Basic validation of the loaded document
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.app.name.is_empty(), "app name is required");
        anyhow::ensure!(
            !self.scheduler.jobs.is_empty(),
            "at least one scheduler job must be configured"
        );
        anyhow::ensure!(
            !self.stock_list.stocks.is_empty(),
            "at least one stock must be configured"
        );
        anyhow::ensure!(
            self.stock_list.stocks.iter().any(|s| s.enabled),
            "at least one stock must be enabled"
        );

        for job in &self.scheduler.jobs {
            anyhow::ensure!(!job.name.is_empty(), "job name is required");
            anyhow::ensure!(
                !job.cron_expr.is_empty(),
                "job '{}' is missing a cron expression",
                job.name
            );
        }

        Ok(())
    }
}
