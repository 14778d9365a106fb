//! Server configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables
//! - Command-line arguments

use cid_registry_db::{DEFAULT_BROADCAST_CAPACITY, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS};
use cid_registry_service::{DEFAULT_MAX_BLOB_BYTES, DEFAULT_MAX_CID_LENGTH};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: HttpServerConfig,

    /// Record storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Registration rules
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Content store settings
    #[serde(default)]
    pub content_store: ContentStoreSettings,

    /// Event publishing settings
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// CORS settings
    #[serde(default)]
    pub cors: CorsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Enable graceful shutdown
    #[serde(default = "default_true")]
    pub graceful_shutdown: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    cid_registry_api::DEFAULT_MAX_BODY_BYTES
}

fn default_true() -> bool {
    true
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            graceful_shutdown: default_true(),
        }
    }
}

/// Which record repository to run on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, lost on restart
    Memory,
    /// Append-only JSON lines file
    #[default]
    Log,
    /// SQLite database through sqlx
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Log => write!(f, "log"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: StorageBackend,

    /// Log file used by the `log` backend
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// fsync every committed entry
    #[serde(default = "default_true")]
    pub sync_on_commit: bool,

    /// Database URL used by the `sqlite` backend
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("data/registrations.log")
}

fn default_database_url() -> String {
    "sqlite://data/registry.db".to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_MIN_CONNECTIONS
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            log_path: default_log_path(),
            sync_on_commit: default_true(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            run_migrations: default_true(),
        }
    }
}

/// Registration rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Only accept recognizable CIDv0/CIDv1 strings
    #[serde(default)]
    pub strict_cid_format: bool,

    /// Longest accepted CID in bytes
    #[serde(default = "default_max_cid_length")]
    pub max_cid_length: usize,
}

fn default_max_cid_length() -> usize {
    DEFAULT_MAX_CID_LENGTH
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_cid_format: false,
            max_cid_length: default_max_cid_length(),
        }
    }
}

/// Content store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentStoreSettings {
    /// Serve `/v1/uploads` backed by the in-memory store
    #[serde(default)]
    pub enabled: bool,

    /// Largest accepted blob in bytes
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: usize,

    /// Upload timeout in milliseconds
    #[serde(default = "default_upload_timeout_ms")]
    pub upload_timeout_ms: u64,
}

fn default_max_blob_bytes() -> usize {
    DEFAULT_MAX_BLOB_BYTES
}

fn default_upload_timeout_ms() -> u64 {
    30_000
}

impl Default for ContentStoreSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_blob_bytes: default_max_blob_bytes(),
            upload_timeout_ms: default_upload_timeout_ms(),
        }
    }
}

/// Event publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of the in-process broadcast channel
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// NATS server; events are only sent to NATS when set
    #[serde(default)]
    pub nats_url: Option<String>,
}

fn default_broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
            nats_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins (empty means all)
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allow credentials
    #[serde(default)]
    pub allow_credentials: bool,

    /// Max age for preflight requests in seconds
    #[serde(default = "default_cors_max_age")]
    pub max_age_seconds: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age_seconds: default_cors_max_age(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from files and environment
    ///
    /// Later sources override earlier ones:
    /// 1. `config/default.toml`
    /// 2. `config/{env}.toml`
    /// 3. Environment variables (`CID_REGISTRY_*`, e.g. `CID_REGISTRY_STORAGE__BACKEND=sqlite`)
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();

        Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            .add_source(
                Environment::with_prefix("CID_REGISTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
