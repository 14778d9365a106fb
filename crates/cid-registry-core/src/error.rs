//! Error types for the CID Registry

use thiserror::Error;

/// Result type alias for Registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for Registry domain operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Content identifier is empty or malformed
    #[error("Invalid CID: {0}")]
    InvalidCid(String),

    /// Handle could not be parsed
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Handle counter cannot advance any further
    #[error("Handle space exhausted")]
    HandleOverflow,

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(RegistryError::HandleOverflow.to_string(), "Handle space exhausted");

        let err = RegistryError::InvalidCid("CID cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid CID: CID cannot be empty");
    }
}
