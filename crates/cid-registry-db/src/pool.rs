//! SQLite connection pool management
//!
//! Connection pooling for the SQLite backend using SQLx's built-in pool,
//! with migrations and a health check run on startup.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Default minimum number of connections in the pool
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum number of connections in the pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default busy timeout in seconds
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// Configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Database URL (e.g., sqlite://data/registry.db or sqlite::memory:)
    pub database_url: String,

    /// Minimum number of connections to maintain in the pool
    pub min_connections: u32,

    /// Maximum number of connections allowed in the pool
    pub max_connections: u32,

    /// Timeout for acquiring a connection
    pub connect_timeout: Duration,

    /// How long a statement waits on a locked database
    pub busy_timeout: Duration,

    /// Whether to enable SQL statement logging
    pub enable_logging: bool,

    /// Whether to run migrations on startup
    pub run_migrations: bool,
}

impl PoolConfig {
    /// Create a new pool configuration with sensible defaults
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
            enable_logging: false,
            run_migrations: true,
        }
    }

    /// Set minimum connections
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable SQL logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable automatic migrations
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Whether the URL points at a private in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Validate the configuration
    pub fn validate(&self) -> DbResult<()> {
        if self.database_url.is_empty() {
            return Err(DbError::Configuration(
                "Database URL cannot be empty".to_string(),
            ));
        }

        if !self.database_url.starts_with("sqlite:") {
            return Err(DbError::Configuration(format!(
                "Unsupported database URL scheme: {}",
                self.database_url
            )));
        }

        if self.min_connections > self.max_connections {
            return Err(DbError::Configuration(format!(
                "min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        if self.max_connections == 0 {
            return Err(DbError::Configuration(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new("sqlite://data/registry.db")
    }
}

/// Create a SQLite connection pool from configuration
pub async fn create_pool(config: &PoolConfig) -> DbResult<SqlitePool> {
    config.validate()?;

    let mut connect_opts = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DbError::Configuration(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout);

    if config.enable_logging {
        connect_opts = connect_opts.log_statements(tracing::log::LevelFilter::Debug);
    } else {
        connect_opts = connect_opts.log_statements(tracing::log::LevelFilter::Off);
    }

    let mut pool_opts = SqlitePoolOptions::new().acquire_timeout(config.connect_timeout);

    // Each connection to `:memory:` is its own database, so keep exactly one alive
    if config.is_in_memory() {
        pool_opts = pool_opts
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        connect_opts = connect_opts.journal_mode(SqliteJournalMode::Wal);
        pool_opts = pool_opts
            .min_connections(config.min_connections)
            .max_connections(config.max_connections);
    }

    info!(
        "Creating database connection pool: min={}, max={}, database={}",
        config.min_connections, config.max_connections, config.database_url
    );

    let pool = pool_opts
        .connect_with(connect_opts)
        .await
        .map_err(|e| DbError::Connection(format!("Failed to create pool: {}", e)))?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    verify_pool_health(&pool).await?;

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Running database migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::Migration(format!("Migration failed: {}", e)))?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Verify that the connection pool is healthy
pub async fn verify_pool_health(pool: &SqlitePool) -> DbResult<()> {
    debug!("Verifying database pool health");

    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DbError::Connection(format!("Health check failed: {}", e)))?;

    Ok(())
}

/// Gracefully close the connection pool
pub async fn close_pool(pool: SqlitePool) {
    info!("Closing database connection pool");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_validation() {
        assert!(PoolConfig::new("sqlite::memory:").validate().is_ok());
        assert!(PoolConfig::new("").validate().is_err());
        assert!(PoolConfig::new("postgres://localhost/db").validate().is_err());

        let bad = PoolConfig::new("sqlite::memory:")
            .min_connections(10)
            .max_connections(5);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(PoolConfig::new("sqlite::memory:").is_in_memory());
        assert!(PoolConfig::new("sqlite://file:reg?mode=memory").is_in_memory());
        assert!(!PoolConfig::new("sqlite://data/registry.db").is_in_memory());
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new("sqlite://data/registry.db")
            .min_connections(2)
            .max_connections(8)
            .busy_timeout(Duration::from_secs(1))
            .enable_logging(true);

        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert!(config.enable_logging);
    }

    #[tokio::test]
    async fn test_create_in_memory_pool() {
        let pool = create_pool(&PoolConfig::new("sqlite::memory:")).await.unwrap();
        verify_pool_health(&pool).await.unwrap();
        close_pool(pool).await;
    }
}
