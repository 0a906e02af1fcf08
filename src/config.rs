//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (BURROW_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [storage]
//! data_dir = "/var/lib/burrow/data"
//!
//! [execution]
//! num_threads = 4
//! query_timeout_ms = 30000
//!
//! [knn]
//! parallelism = 2
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! BURROW_STORAGE__DATA_DIR=/custom/path
//! BURROW_KNN__PARALLELISM=4
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub knn: KnnConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all schema and entity storage
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Resident frames per column buffer pool
    #[serde(default = "default_buffer_pool_pages")]
    pub buffer_pool_pages: usize,

    /// Flush column stores after every write transaction
    #[serde(default = "default_true")]
    pub flush_on_write: bool,
}

/// Query execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker threads for parallel task execution. 0 = all CPU cores.
    #[serde(default)]
    pub num_threads: usize,

    /// Query timeout in milliseconds. 0 = no timeout.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Upper bound for one response frame; page sizes of streamed
    /// results are derived from it.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// kNN evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnConfig {
    /// Parallel sub-scans per kNN task; the tuple-id space is split into
    /// this many equal contiguous ranges.
    #[serde(default = "default_knn_parallelism")]
    pub parallelism: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_buffer_pool_pages() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_query_timeout_ms() -> u64 {
    60_000
}

fn default_max_message_size() -> usize {
    4 * 1024 * 1024
}

fn default_knn_parallelism() -> usize {
    2
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: default_data_dir(),
            buffer_pool_pages: default_buffer_pool_pages(),
            flush_on_write: true,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            num_threads: 0,
            query_timeout_ms: default_query_timeout_ms(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for KnnConfig {
    fn default() -> Self {
        KnnConfig {
            parallelism: default_knn_parallelism(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            execution: ExecutionConfig::default(),
            knn: KnnConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Order of precedence (later wins):
    /// 1. config.toml
    /// 2. config.local.toml
    /// 3. BURROW_* environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("BURROW_").split("__"))
            .extract()
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = dir.into();
        self
    }

    /// Set the query timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution.query_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Disable the query timeout
    pub fn without_timeout(mut self) -> Self {
        self.execution.query_timeout_ms = 0;
        self
    }

    /// Set kNN scan parallelism
    pub fn with_knn_parallelism(mut self, parallelism: usize) -> Self {
        self.knn.parallelism = parallelism.max(1);
        self
    }

    /// Query timeout as a `Duration`, `None` when disabled.
    pub fn query_timeout(&self) -> Option<Duration> {
        match self.execution.query_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
