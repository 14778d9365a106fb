//! Validation service
//!
//! Turns caller-supplied strings into [`Cid`]s. Validation is lenient by
//! default: any non-empty string up to the length limit is accepted. Strict
//! mode additionally requires the value to decode as a CIDv0 or CIDv1.

use async_trait::async_trait;
use cid_registry_core::{Cid, CidFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Default upper bound on CID length
pub const DEFAULT_MAX_CID_LENGTH: usize = 512;

/// Validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Require CIDv0/CIDv1 encodings
    pub strict_cid_format: bool,

    /// Longest accepted CID in bytes
    pub max_cid_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_cid_format: false,
            max_cid_length: DEFAULT_MAX_CID_LENGTH,
        }
    }
}

/// Trait for CID validation
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// Validate a caller-supplied CID
    async fn validate_cid(&self, raw: &str) -> ServiceResult<Cid>;
}

/// Default implementation of ValidationService
#[derive(Debug, Clone, Default)]
pub struct DefaultValidationService {
    config: ValidationConfig,
}

impl DefaultValidationService {
    /// Create a validation service
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ValidationService for DefaultValidationService {
    #[instrument(skip(self, raw), fields(len = raw.len()))]
    async fn validate_cid(&self, raw: &str) -> ServiceResult<Cid> {
        let cid = Cid::new(raw)?;

        if cid.len() > self.config.max_cid_length {
            return Err(ServiceError::InvalidInput(format!(
                "CID exceeds {} bytes",
                self.config.max_cid_length
            )));
        }

        let format = cid.format();
        if self.config.strict_cid_format && !format.is_recognized() {
            return Err(ServiceError::InvalidInput(format!(
                "Not a decodable CID: {}",
                cid
            )));
        }

        if format == CidFormat::Unknown {
            debug!("Accepting CID with unrecognized encoding");
        }

        Ok(cid)
    }
}
