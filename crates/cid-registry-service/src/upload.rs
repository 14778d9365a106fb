//! Upload pipeline
//!
//! Uploads a blob to the content store and registers the resulting CID.
//! The registry is only touched after the store has answered with a CID.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::content::ContentStore;
use crate::dto::{RegisterCidRequest, UploadResponse};
use crate::error::{ServiceError, ServiceResult};
use crate::registration::RegistrationService;

/// Default time allowed for a content store upload
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for the upload-then-register flow
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Upload a blob and register its CID
    async fn upload_and_register(&self, blob: &[u8]) -> ServiceResult<UploadResponse>;
}

/// Default implementation of UploadService
pub struct DefaultUploadService {
    content_store: Arc<dyn ContentStore>,
    registration: Arc<dyn RegistrationService>,
    timeout: Duration,
}

impl DefaultUploadService {
    /// Create an upload service with the default timeout
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        registration: Arc<dyn RegistrationService>,
    ) -> Self {
        Self {
            content_store,
            registration,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    /// Set the upload timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl UploadService for DefaultUploadService {
    #[instrument(skip(self, blob), fields(size = blob.len(), store = self.content_store.name()))]
    async fn upload_and_register(&self, blob: &[u8]) -> ServiceResult<UploadResponse> {
        let cid = match tokio::time::timeout(self.timeout, self.content_store.upload(blob)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Content store upload timed out after {:?}", self.timeout);
                return Err(ServiceError::StoreUnavailable(format!(
                    "upload timed out after {} ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let registration = self
            .registration
            .register(RegisterCidRequest::new(cid.into_inner()))
            .await?;

        info!(handle = %registration.handle, "Uploaded blob registered");

        Ok(UploadResponse {
            handle: registration.handle,
            cid: registration.cid,
            size_bytes: blob.len() as u64,
        })
    }
}
