//! Service layer for the CID Registry
//!
//! This crate sits between the API and persistence layers and implements the
//! registry's business logic:
//!
//! - **RegistrationService**: register, look up, count, and list records
//! - **ValidationService**: CID acceptance rules (lenient or strict)
//! - **EventFeed**: live stream of registration events for indexers
//! - **ContentStore**: content-addressed blob storage returning CIDs
//! - **UploadService**: upload a blob, then register its CID
//!
//! # Example
//!
//! ```rust,no_run
//! use cid_registry_db::{BroadcastEventPublisher, MemoryRecordRepository};
//! use cid_registry_service::{RegisterCidRequest, ServiceRegistry, ValidationConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let services = ServiceRegistry::new(
//!     Arc::new(MemoryRecordRepository::new()),
//!     Arc::new(BroadcastEventPublisher::default()),
//!     ValidationConfig::default(),
//! );
//!
//! let registered = services
//!     .registration()
//!     .register(RegisterCidRequest::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"))
//!     .await?;
//! assert_eq!(registered.handle.value(), 0);
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod dto;
pub mod error;
pub mod events;
pub mod registration;
pub mod upload;
pub mod validation;

// Re-export main types for convenience
pub use dto::*;
pub use error::{ServiceError, ServiceResult};
pub use events::EventFeed;

// Re-export service traits and implementations
pub use content::{ContentStore, ContentStoreConfig, MemoryContentStore, DEFAULT_MAX_BLOB_BYTES};
pub use registration::{DefaultRegistrationService, RegistrationService};
pub use upload::{DefaultUploadService, UploadService, DEFAULT_UPLOAD_TIMEOUT};
pub use validation::{
    DefaultValidationService, ValidationConfig, ValidationService, DEFAULT_MAX_CID_LENGTH,
};

use cid_registry_db::{BroadcastEventPublisher, EventPublisher, RecordRepository};
use std::sync::Arc;
use std::time::Duration;

/// Service registry that holds all service instances
#[derive(Clone)]
pub struct ServiceRegistry {
    /// Registration service
    pub registration: Arc<dyn RegistrationService>,
    /// Upload service, present only when a content store is configured
    pub upload: Option<Arc<dyn UploadService>>,
    /// Live event feed, present when events go through a broadcast channel
    pub events: Option<EventFeed>,
}

impl ServiceRegistry {
    /// Create a service registry with default implementations and no content store
    pub fn new(
        repository: Arc<dyn RecordRepository>,
        publisher: Arc<dyn EventPublisher>,
        validation_config: ValidationConfig,
    ) -> Self {
        let validation = Arc::new(DefaultValidationService::new(validation_config));
        let registration = Arc::new(DefaultRegistrationService::new(
            repository,
            publisher,
            validation,
        ));

        Self {
            registration,
            upload: None,
            events: None,
        }
    }

    /// Enable the upload pipeline over a content store
    pub fn with_content_store(
        mut self,
        content_store: Arc<dyn ContentStore>,
        upload_timeout: Duration,
    ) -> Self {
        let upload = DefaultUploadService::new(content_store, self.registration.clone())
            .with_timeout(upload_timeout);
        self.upload = Some(Arc::new(upload));
        self
    }

    /// Expose a broadcast publisher as the live event feed
    ///
    /// The publisher must be the one (or part of the one) passed to
    /// [`ServiceRegistry::new`], otherwise the feed stays silent.
    pub fn with_event_feed(mut self, publisher: BroadcastEventPublisher) -> Self {
        self.events = Some(EventFeed::new(publisher));
        self
    }

    /// Get the registration service
    pub fn registration(&self) -> &Arc<dyn RegistrationService> {
        &self.registration
    }

    /// Get the upload service, if configured
    pub fn upload(&self) -> Option<&Arc<dyn UploadService>> {
        self.upload.as_ref()
    }

    /// Get the live event feed, if configured
    pub fn events(&self) -> Option<&EventFeed> {
        self.events.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cid_registry_db::MemoryRecordRepository;
    use futures::StreamExt;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(
            Arc::new(MemoryRecordRepository::new()),
            Arc::new(BroadcastEventPublisher::default()),
            ValidationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_registry_without_content_store() {
        let services = registry();
        assert!(services.upload().is_none());

        let registered = services
            .registration()
            .register(RegisterCidRequest::new("cidA"))
            .await
            .unwrap();
        assert_eq!(registered.handle.value(), 0);
    }

    #[tokio::test]
    async fn test_event_feed_follows_registrations() {
        let publisher = BroadcastEventPublisher::default();
        let services = ServiceRegistry::new(
            Arc::new(MemoryRecordRepository::new()),
            Arc::new(publisher.clone()),
            ValidationConfig::default(),
        )
        .with_event_feed(publisher);

        let mut feed = services.events().unwrap().subscribe();
        services
            .registration()
            .register(RegisterCidRequest::new("cidA"))
            .await
            .unwrap();

        let event = feed.next().await.unwrap();
        assert_eq!(event.handle().value(), 0);
        assert!(registry().events().is_none());
    }

    #[tokio::test]
    async fn test_upload_shares_the_ledger() {
        let services = registry().with_content_store(
            Arc::new(MemoryContentStore::default()),
            Duration::from_secs(1),
        );

        services
            .registration()
            .register(RegisterCidRequest::new("cidA"))
            .await
            .unwrap();

        let uploaded = services
            .upload()
            .unwrap()
            .upload_and_register(b"payload")
            .await
            .unwrap();
        assert_eq!(uploaded.handle.value(), 1);
        assert_eq!(services.registration().count().await.unwrap().count, 2);
    }
}
