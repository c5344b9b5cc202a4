//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: set on the builder and mirrored in `Default` implementations
//! 2. **Config file**: TOML file named by the `EXPLORER_CONFIG` env var
//! 3. **Environment variables**: `EXPLORER__SECTION__FIELD`, e.g. `EXPLORER__NODE__URL`
//!
//! # Configuration Sections
//!
//! - [`NodeConfig`]: node RPC endpoint, credentials, timeout and concurrency
//! - [`ExplorerConfig`]: sync mode, batch and orphan window sizes, worker cadences
//! - [`StoreConfig`]: database URL for persisted mode
//! - [`MetricsConfig`]: Prometheus exporter
//! - [`LoggingConfig`]: log level and format
//!
//! # Validation
//!
//! [`AppConfig::validate`] rejects missing node credentials, a persisted mode without a
//! database and zero cadences or capacities. The runtime refuses to start on failure.
//!
//! # Example
//!
//! ```toml
//! [node]
//! url = "http://127.0.0.1:58812"
//! username = "rpcuser"
//! password = "rpcpassword"
//!
//! [explorer]
//! mode = "persisted"
//! blocks_per_batch = 10
//! blocks_orphan_check = 12
//!
//! [store]
//! database_url = "sqlite://explorer.db?mode=rwc"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Blocks fetched per persisted-mode tick when the configured value is zero.
pub const DEFAULT_BLOCKS_PER_BATCH: u64 = 10;

/// Orphan window when the configured value is zero.
pub const DEFAULT_BLOCKS_ORPHAN_CHECK: u64 = 12;

/// Ingestion strategy, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// In-memory caches only; starts from the node's current tip.
    #[default]
    CacheOnly,
    /// Writes through to the relational store; resumes from its highest synced block.
    Persisted,
}

impl SyncMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheOnly => "cache_only",
            Self::Persisted => "persisted",
        }
    }
}

/// Node RPC connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// `http://` or `https://` JSON-RPC endpoint.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout. Defaults to `30`.
    pub timeout_seconds: u64,
    /// Maximum in-flight requests. Defaults to `16`.
    pub concurrency_limit: usize,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub mode: SyncMode,
    /// Blocks per persisted-mode tick. Zero means [`DEFAULT_BLOCKS_PER_BATCH`].
    pub blocks_per_batch: u64,
    /// Trailing heights re-validated for reorgs. Zero means [`DEFAULT_BLOCKS_ORPHAN_CHECK`].
    pub blocks_orphan_check: u64,
    pub pull_blocks_delay_ms: u64,
    pub pull_blockchain_info_delay_ms: u64,
    pub pull_blockchain_stats_delay_ms: u64,
    pub broadcast_delay_ms: u64,
    /// Points in the `overall` transaction statistics series.
    pub stats_points_count: usize,
    /// Target block interval, used to size the day/week/month statistics series.
    pub block_time_seconds: u64,
    pub recent_blocks_capacity: usize,
    pub block_cache_max_blocks: usize,
    /// Cache-only startup retry interval while the node tip is unknown.
    pub startup_retry_delay_ms: u64,
    pub push_channel_capacity: usize,
}

/// Persisted store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection string, required in persisted mode.
    pub database_url: Option<String>,
    /// Also fetch and store raw transaction hex while ingesting.
    pub store_raw_transactions: bool,
}

/// Prometheus metrics export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the exporter is installed. Defaults to `false`.
    pub enabled: bool,

    /// Port of the Prometheus scrape endpoint. Defaults to `9090`.
    pub prometheus_port: u16,
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub explorer: ExplorerConfig,
    pub store: StoreConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:58812".to_string(),
            username: None,
            password: None,
            timeout_seconds: 30,
            concurrency_limit: 16,
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::CacheOnly,
            blocks_per_batch: DEFAULT_BLOCKS_PER_BATCH,
            blocks_orphan_check: DEFAULT_BLOCKS_ORPHAN_CHECK,
            pull_blocks_delay_ms: 1_000,
            pull_blockchain_info_delay_ms: 1_000,
            pull_blockchain_stats_delay_ms: 60_000,
            broadcast_delay_ms: 1_000,
            stats_points_count: 100,
            block_time_seconds: 120,
            recent_blocks_capacity: 100,
            block_cache_max_blocks: 1_000,
            startup_retry_delay_ms: 5_000,
            push_channel_capacity: 256,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, prometheus_port: 9090 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl ExplorerConfig {
    /// Batch size with the zero fallback applied.
    #[must_use]
    pub fn effective_batch_size(&self) -> u64 {
        if self.blocks_per_batch == 0 {
            DEFAULT_BLOCKS_PER_BATCH
        } else {
            self.blocks_per_batch
        }
    }

    /// Orphan window with the zero fallback applied.
    #[must_use]
    pub fn effective_orphan_window(&self) -> u64 {
        if self.blocks_orphan_check == 0 {
            DEFAULT_BLOCKS_ORPHAN_CHECK
        } else {
            self.blocks_orphan_check
        }
    }

    #[must_use]
    pub fn pull_blocks_delay(&self) -> Duration {
        Duration::from_millis(self.pull_blocks_delay_ms)
    }

    #[must_use]
    pub fn pull_blockchain_info_delay(&self) -> Duration {
        Duration::from_millis(self.pull_blockchain_info_delay_ms)
    }

    #[must_use]
    pub fn pull_blockchain_stats_delay(&self) -> Duration {
        Duration::from_millis(self.pull_blockchain_stats_delay_ms)
    }

    #[must_use]
    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.broadcast_delay_ms)
    }

    #[must_use]
    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }
}

impl AppConfig {
    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error: defaults and environment variables still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or values have the wrong type.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("node.url", "http://127.0.0.1:58812")?
            .set_default("node.timeout_seconds", 30)?
            .set_default("node.concurrency_limit", 16)?
            .set_default("explorer.mode", "cache_only")?
            .set_default("explorer.blocks_per_batch", DEFAULT_BLOCKS_PER_BATCH)?
            .set_default("explorer.blocks_orphan_check", DEFAULT_BLOCKS_ORPHAN_CHECK)?
            .set_default("store.store_raw_transactions", false)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.prometheus_port", 9090)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("EXPLORER").separator("__").try_parsing(true))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `EXPLORER_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("EXPLORER_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.node.url.is_empty() {
            return Err("Node RPC URL is not configured".to_string());
        }
        if !self.node.url.starts_with("http://") && !self.node.url.starts_with("https://") {
            return Err(format!("Invalid node RPC URL: {}", self.node.url));
        }
        if self.node.username.as_deref().unwrap_or_default().is_empty() {
            return Err("Node RPC username is not configured".to_string());
        }
        if self.node.password.as_deref().unwrap_or_default().is_empty() {
            return Err("Node RPC password is not configured".to_string());
        }
        if self.node.timeout_seconds == 0 {
            return Err("Node timeout must be greater than 0".to_string());
        }
        if self.node.concurrency_limit == 0 {
            return Err("Node concurrency limit must be greater than 0".to_string());
        }

        if self.explorer.mode == SyncMode::Persisted &&
            self.store.database_url.as_deref().unwrap_or_default().is_empty()
        {
            return Err("Persisted mode requires store.database_url".to_string());
        }

        let explorer = &self.explorer;
        for (name, value) in [
            ("pull_blocks_delay_ms", explorer.pull_blocks_delay_ms),
            ("pull_blockchain_info_delay_ms", explorer.pull_blockchain_info_delay_ms),
            ("pull_blockchain_stats_delay_ms", explorer.pull_blockchain_stats_delay_ms),
            ("broadcast_delay_ms", explorer.broadcast_delay_ms),
            ("startup_retry_delay_ms", explorer.startup_retry_delay_ms),
            ("block_time_seconds", explorer.block_time_seconds),
        ] {
            if value == 0 {
                return Err(format!("explorer.{name} must be greater than 0"));
            }
        }
        for (name, value) in [
            ("stats_points_count", explorer.stats_points_count),
            ("recent_blocks_capacity", explorer.recent_blocks_capacity),
            ("block_cache_max_blocks", explorer.block_cache_max_blocks),
            ("push_channel_capacity", explorer.push_channel_capacity),
        ] {
            if value == 0 {
                return Err(format!("explorer.{name} must be greater than 0"));
            }
        }

        if (explorer.recent_blocks_capacity as u64) < explorer.effective_orphan_window() + 1 {
            return Err(
                "explorer.recent_blocks_capacity must cover the orphan window plus the tip"
                    .to_string(),
            );
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        if self.metrics.enabled && self.metrics.prometheus_port == 0 {
            return Err("Prometheus port must be greater than 0".to_string());
        }

        Ok(())
    }
}
