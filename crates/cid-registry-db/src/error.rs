//! Persistence-specific error types and conversions
//!
//! This module provides error types for storage operations, including
//! connection errors, query errors, log I/O errors, and data validation errors.

use thiserror::Error;

/// Result type alias for persistence operations
pub type DbResult<T> = Result<T, DbError>;

/// Persistence-layer errors
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// SQL query error
    #[error("Query error: {0}")]
    Query(String),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Append-only log I/O error
    #[error("Log I/O error: {0}")]
    Io(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Persisted data is inconsistent (e.g. a log with gaps)
    #[error("Invalid data format: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Event publishing error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal persistence error
    #[error("Internal database error: {0}")]
    Internal(String),

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] cid_registry_core::RegistryError),
}

impl DbError {
    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// Check if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }

    /// Check if this is a transient error that could be retried by the caller
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Connection(_) | DbError::Pool(_) | DbError::Io(_)
        )
    }
}

/// Convert SQLx database errors to our error type
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound("No rows returned".to_string()),

            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                let message = db_err.message();

                // SQLite extended result codes: https://www.sqlite.org/rescode.html
                match code.as_deref() {
                    // UNIQUE, PRIMARYKEY, CHECK, NOTNULL
                    Some("2067") | Some("1555") | Some("275") | Some("1299") => {
                        DbError::ConstraintViolation(message.to_string())
                    }
                    // BUSY, LOCKED, BUSY_SNAPSHOT
                    Some("5") | Some("6") | Some("517") => {
                        DbError::Connection(format!("Database busy: {}", message))
                    }
                    _ => DbError::Query(message.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::Pool("Connection pool timeout".to_string()),

            sqlx::Error::PoolClosed => DbError::Pool("Connection pool closed".to_string()),

            sqlx::Error::Io(io_err) => DbError::Connection(format!("I/O error: {}", io_err)),

            sqlx::Error::Protocol(msg) => DbError::Connection(format!("Protocol error: {}", msg)),

            sqlx::Error::ColumnNotFound(col) => {
                DbError::InvalidData(format!("Column not found: {}", col))
            }

            sqlx::Error::Decode(msg) => DbError::Serialization(format!("Decode error: {}", msg)),

            sqlx::Error::Migrate(migrate_err) => DbError::Migration(format!("{}", migrate_err)),

            _ => DbError::Internal(format!("{}", err)),
        }
    }
}

/// Convert SQLx migration errors
impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(format!("{}", err))
    }
}

/// Convert log file I/O errors
impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err.to_string())
    }
}

/// Convert serde_json errors
impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(format!("{}", err))
    }
}
