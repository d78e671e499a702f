//! Configuration loading for retrievo.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/retrievo/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RetrievoError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB document store directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory holding the persisted vector index file
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Embedding dimension every stored and queried vector must have
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// gRPC server port
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// gRPC server host
    #[serde(default = "default_grpc_host")]
    pub grpc_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of results returned when a search does not specify top_k
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    /// Attempts made to flush the index after an add before giving up
    #[serde(default = "default_flush_max_retries")]
    pub flush_max_retries: u32,

    /// First backoff delay between flush attempts (ms)
    #[serde(default = "default_flush_retry_initial_ms")]
    pub flush_retry_initial_ms: u64,

    /// Upper bound on a single backoff delay between flush attempts (ms)
    #[serde(default = "default_flush_retry_max_ms")]
    pub flush_retry_max_ms: u64,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "retrievo")
}

fn default_db_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_index_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("vector-index"))
        .unwrap_or_else(|| PathBuf::from("./vector-index"))
        .to_string_lossy()
        .to_string()
}

fn default_dimension() -> usize {
    768 // nomic-embed-text
}

fn default_grpc_port() -> u16 {
    50061
}

fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_top_k() -> u32 {
    5
}

fn default_flush_max_retries() -> u32 {
    3
}

fn default_flush_retry_initial_ms() -> u64 {
    10
}

fn default_flush_retry_max_ms() -> u64 {
    200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            index_path: default_index_path(),
            dimension: default_dimension(),
            grpc_port: default_grpc_port(),
            grpc_host: default_grpc_host(),
            log_level: default_log_level(),
            default_top_k: default_top_k(),
            flush_max_retries: default_flush_max_retries(),
            flush_retry_initial_ms: default_flush_retry_initial_ms(),
            flush_retry_max_ms: default_flush_retry_max_ms(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/retrievo/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RETRIEVO_*, nested with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RetrievoError> {
        let config_dir = project_dirs()
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .set_default("index_path", default_index_path())
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .set_default("dimension", default_dimension() as i64)
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .set_default("grpc_port", default_grpc_port() as i64)
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .set_default("grpc_host", default_grpc_host())
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| RetrievoError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RETRIEVO_GRPC_PORT, RETRIEVO_DIMENSION, RETRIEVO_FLUSH_MAX_RETRIES, ...
        builder = builder.add_source(
            Environment::with_prefix("RETRIEVO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| RetrievoError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| RetrievoError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RetrievoError> {
        if self.dimension == 0 {
            return Err(RetrievoError::Config("dimension must be > 0".to_string()));
        }
        if self.dimension > u32::MAX as usize {
            return Err(RetrievoError::Config(format!(
                "dimension must fit in 32 bits, got {}",
                self.dimension
            )));
        }
        if self.default_top_k == 0 {
            return Err(RetrievoError::Config(
                "default_top_k must be > 0".to_string(),
            ));
        }
        if self.flush_max_retries == 0 {
            return Err(RetrievoError::Config(
                "flush_max_retries must be > 0".to_string(),
            ));
        }
        if self.flush_retry_initial_ms > self.flush_retry_max_ms {
            return Err(RetrievoError::Config(format!(
                "flush_retry_initial_ms ({}) exceeds flush_retry_max_ms ({})",
                self.flush_retry_initial_ms, self.flush_retry_max_ms
            )));
        }
        Ok(())
    }

    /// Get the socket address for the gRPC server
    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.grpc_host, self.grpc_port)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in index_path to the home directory
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
