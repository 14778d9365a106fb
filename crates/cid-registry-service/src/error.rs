//! Service-layer error types
//!
//! Domain and persistence errors are folded into the small set of outcomes
//! callers can act on.

use cid_registry_core::RegistryError;
use cid_registry_db::DbError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Caller supplied an unusable value (e.g. an empty CID)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No record exists for the requested handle
    #[error("Not found: {0}")]
    NotFound(String),

    /// The content store could not be reached or timed out
    #[error("Content store unavailable: {0}")]
    StoreUnavailable(String),

    /// The content store refused the blob
    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    /// The registration could not be made durable; nothing was committed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ServiceError::UploadRejected(_) => "UPLOAD_REJECTED",
            ServiceError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidCid(msg) => ServiceError::InvalidInput(msg),
            RegistryError::InvalidHandle(msg) => ServiceError::InvalidInput(msg),
            RegistryError::HandleOverflow => ServiceError::PersistenceFailure(err.to_string()),
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}

/// Every persistence error surfaces as a `PersistenceFailure`
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        ServiceError::PersistenceFailure(err.to_string())
    }
}
