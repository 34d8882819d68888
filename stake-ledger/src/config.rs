//! Configuration for the staking ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address
    pub http_listen_addr: String,

    /// Log output format: "text" or "json"
    pub log_format: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Activity batching configuration
    pub batching: BatchingConfig,

    /// Admin gate configuration
    pub admin: AdminConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/stake-ledger"),
            service_name: "stake-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            http_listen_addr: "0.0.0.0:8080".to_string(),
            log_format: "text".to_string(),
            rocksdb: RocksDBConfig::default(),
            batching: BatchingConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Batching of activity events in the writer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Maximum batch size (events)
    pub max_batch_size: usize,

    /// Batch timeout (milliseconds)
    pub batch_timeout_ms: u64,

    /// Enable batching
    pub enabled: bool,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_timeout_ms: 50,
            enabled: true,
        }
    }
}

/// Admin config gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Administrator Ed25519 public key, base58
    pub public_key: Option<String>,

    /// Reward rate (percent) served before the first admin update
    pub initial_reward_rate: Decimal,

    /// Refuse a signature that was already accepted once
    pub reject_replayed_signatures: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            initial_reward_rate: Decimal::from(10),
            reject_replayed_signatures: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Config::default().with_env_overrides()
    }

    /// Apply `STAKE_LEDGER_*` environment overrides
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        if let Ok(data_dir) = std::env::var("STAKE_LEDGER_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("STAKE_LEDGER_HTTP_ADDR") {
            self.http_listen_addr = addr;
        }

        if let Ok(format) = std::env::var("STAKE_LEDGER_LOG_FORMAT") {
            self.log_format = format;
        }

        if let Ok(key) = std::env::var("STAKE_LEDGER_ADMIN_PUBLIC_KEY") {
            let key = key.trim().to_string();
            self.admin.public_key = if key.is_empty() { None } else { Some(key) };
        }

        if let Ok(rate) = std::env::var("STAKE_LEDGER_INITIAL_REWARD_RATE") {
            self.admin.initial_reward_rate = Decimal::from_str(rate.trim()).map_err(|e| {
                crate::Error::Config(format!("Invalid STAKE_LEDGER_INITIAL_REWARD_RATE: {}", e))
            })?;
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.admin.initial_reward_rate.is_sign_negative() {
            return Err(crate::Error::Config(
                "Initial reward rate cannot be negative".to_string(),
            ));
        }

        if self.batching.enabled && self.batching.max_batch_size == 0 {
            return Err(crate::Error::Config(
                "Batch size must be positive when batching is enabled".to_string(),
            ));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(crate::Error::Config(format!(
                "Unknown log format: {}",
                self.log_format
            )));
        }

        Ok(())
    }
}
