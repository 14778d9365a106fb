//! Persistence layer for the CID Registry
//!
//! This crate stores the registration ledger and publishes registry events:
//! - The [`RecordRepository`] trait over the append-only ledger
//! - An in-memory backend for tests and ephemeral deployments
//! - An append-only JSON-lines log backend with replay on open
//! - A SQLite backend built on SQLx with embedded migrations
//! - Event publishing to in-process subscribers and NATS
//!
//! Every backend serializes handle assignment, so handles are issued as the
//! gap-free sequence `0, 1, 2, ...` and a failed commit consumes nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use cid_registry_db::{create_pool, PoolConfig, RecordRepository, SqliteRecordRepository};
//! use cid_registry_core::Cid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&PoolConfig::new("sqlite://data/registry.db")).await?;
//! let repo = SqliteRecordRepository::new(pool);
//!
//! let record = repo.append(Cid::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")?).await?;
//! println!("registered as {}", record.handle);
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use cid_registry_core;

pub mod error;
pub mod log_store;
pub mod memory;
pub mod nats_publisher;
pub mod pool;
pub mod publisher;
pub mod repository;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use log_store::LogRecordRepository;
pub use memory::MemoryRecordRepository;
pub use nats_publisher::{EventMessage, NatsEventPublisher, NatsPublisherConfig};
pub use pool::{
    close_pool, create_pool, run_migrations, verify_pool_health, PoolConfig,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS,
};
pub use publisher::{
    BroadcastEventPublisher, CompositeEventPublisher, EventPublisher, DEFAULT_BROADCAST_CAPACITY,
};
pub use repository::{verify_sequence, ListQuery, RecordRepository, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
pub use sqlite::SqliteRecordRepository;

// Re-export sqlx types that users may need
pub use sqlx::sqlite::SqlitePool;

/// Persistence layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database URL environment variable name
pub const DEFAULT_DATABASE_URL_ENV: &str = "DATABASE_URL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_env_var() {
        assert_eq!(DEFAULT_DATABASE_URL_ENV, "DATABASE_URL");
    }
}
