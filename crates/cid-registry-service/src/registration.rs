//! Registration service
//!
//! Orchestrates validation, the append-only commit, and event emission.
//! An event is only emitted once the record is durable, and a failed
//! publish never undoes or fails the registration. Once validation passes,
//! commit and publish run to completion even if the caller goes away.

use async_trait::async_trait;
use cid_registry_core::{Handle, RegistrationRecord, RegistryEvent};
use cid_registry_db::{EventPublisher, ListQuery, RecordRepository, DEFAULT_LIST_LIMIT};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::dto::{
    CountResponse, ListRecordsRequest, ListRecordsResponse, RegisterCidRequest,
    RegistrationResponse, RegistryHealth,
};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::ValidationService;

/// Trait for registry operations
///
/// There is no update or delete: a handle, once issued, maps to the same
/// CID forever.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Register a CID and return the issued handle
    async fn register(&self, request: RegisterCidRequest) -> ServiceResult<RegistrationResponse>;

    /// Look up the record for a handle; `None` if it was never issued
    async fn get_record(&self, handle: Handle) -> ServiceResult<Option<RegistrationResponse>>;

    /// Number of registrations so far
    async fn count(&self) -> ServiceResult<CountResponse>;

    /// Page through records in handle order
    async fn list_records(&self, request: ListRecordsRequest) -> ServiceResult<ListRecordsResponse>;

    /// Storage backend health
    async fn health(&self) -> RegistryHealth;
}

/// Default implementation of RegistrationService
pub struct DefaultRegistrationService {
    repository: Arc<dyn RecordRepository>,
    publisher: Arc<dyn EventPublisher>,
    validation_service: Arc<dyn ValidationService>,
}

impl DefaultRegistrationService {
    /// Create a new registration service
    pub fn new(
        repository: Arc<dyn RecordRepository>,
        publisher: Arc<dyn EventPublisher>,
        validation_service: Arc<dyn ValidationService>,
    ) -> Self {
        Self {
            repository,
            publisher,
            validation_service,
        }
    }

}

/// Emit the registered event for a committed record
async fn emit_registered_event(publisher: &dyn EventPublisher, record: &RegistrationRecord) {
    let event = RegistryEvent::registered(record);

    if let Err(e) = publisher.publish(&event).await {
        warn!(
            handle = %record.handle,
            publisher = publisher.name(),
            "Failed to emit registered event: {}", e
        );
    }
}

#[async_trait]
impl RegistrationService for DefaultRegistrationService {
    #[instrument(skip(self, request))]
    async fn register(&self, request: RegisterCidRequest) -> ServiceResult<RegistrationResponse> {
        let cid = self.validation_service.validate_cid(&request.cid).await?;

        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        // Commit and announce on a detached task: dropping the caller's
        // future must not leave a committed record without its event.
        let record = tokio::spawn(async move {
            let record = repository.append(cid).await?;
            emit_registered_event(publisher.as_ref(), &record).await;
            Ok::<_, ServiceError>(record)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("Registration task failed: {}", e)))??;

        info!(handle = %record.handle, cid = %record.cid, "CID registered");
        Ok(record.into())
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn get_record(&self, handle: Handle) -> ServiceResult<Option<RegistrationResponse>> {
        let record = self.repository.find_by_handle(handle).await?;
        if record.is_none() {
            debug!("Handle not issued");
        }
        Ok(record.map(Into::into))
    }

    async fn count(&self) -> ServiceResult<CountResponse> {
        Ok(CountResponse {
            count: self.repository.count().await?,
        })
    }

    #[instrument(skip(self))]
    async fn list_records(&self, request: ListRecordsRequest) -> ServiceResult<ListRecordsResponse> {
        if request.limit == Some(0) {
            return Err(ServiceError::InvalidInput(
                "limit must be greater than 0".to_string(),
            ));
        }

        let mut query = ListQuery::new().limit(request.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        if let Some(after) = request.after {
            query = query.after(after);
        }

        let records = self.repository.list(&query).await?;
        let total = self.repository.count().await?;

        let next_after = records
            .last()
            .map(|r| r.handle)
            .filter(|h| h.value().saturating_add(1) < total);

        Ok(ListRecordsResponse {
            records: records.into_iter().map(Into::into).collect(),
            total,
            next_after,
        })
    }

    async fn health(&self) -> RegistryHealth {
        let backend = self.repository.backend_name().to_string();

        match self.repository.health_check().await {
            Ok(()) => RegistryHealth {
                backend,
                healthy: true,
                message: None,
                record_count: self.repository.count().await.ok(),
            },
            Err(e) => RegistryHealth {
                backend,
                healthy: false,
                message: Some(e.to_string()),
                record_count: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{DefaultValidationService, ValidationConfig};
    use cid_registry_core::{Cid, EventType};
    use cid_registry_db::{
        BroadcastEventPublisher, DbError, DbResult, LogRecordRepository, MemoryRecordRepository,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Repository double whose commits can be made to fail
    struct FlakyRepository {
        inner: MemoryRecordRepository,
        fail: AtomicBool,
    }

    #[async_trait]
    impl RecordRepository for FlakyRepository {
        async fn append(&self, cid: Cid) -> DbResult<RegistrationRecord> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DbError::Io("disk full".to_string()));
            }
            self.inner.append(cid).await
        }

        async fn find_by_handle(&self, handle: Handle) -> DbResult<Option<RegistrationRecord>> {
            self.inner.find_by_handle(handle).await
        }

        async fn count(&self) -> DbResult<u64> {
            self.inner.count().await
        }

        async fn list(&self, query: &ListQuery) -> DbResult<Vec<RegistrationRecord>> {
            self.inner.list(query).await
        }

        async fn health_check(&self) -> DbResult<()> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &RegistryEvent) -> DbResult<()> {
            Err(DbError::Publish("broker down".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn service_with(
        repository: Arc<dyn RecordRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> DefaultRegistrationService {
        DefaultRegistrationService::new(
            repository,
            publisher,
            Arc::new(DefaultValidationService::new(ValidationConfig::default())),
        )
    }

    fn service() -> (DefaultRegistrationService, Arc<BroadcastEventPublisher>) {
        let publisher = Arc::new(BroadcastEventPublisher::new(64));
        let service = service_with(Arc::new(MemoryRecordRepository::new()), publisher.clone());
        (service, publisher)
    }

    #[tokio::test]
    async fn test_first_registrations() {
        let (service, publisher) = service();
        let mut events = publisher.subscribe();

        let a = service.register(RegisterCidRequest::new("cidA")).await.unwrap();
        let b = service.register(RegisterCidRequest::new("cidB")).await.unwrap();

        assert_eq!(a.handle, Handle::new(0));
        assert_eq!(b.handle, Handle::new(1));
        assert_eq!(service.count().await.unwrap().count, 2);

        let record = service.get_record(Handle::new(1)).await.unwrap().unwrap();
        assert_eq!(record.cid.as_str(), "cidB");

        for expected in [("cidA", 0), ("cidB", 1)] {
            let event = events.recv().await.unwrap();
            assert_eq!(
                event.event_type,
                EventType::CidRegistered {
                    handle: Handle::new(expected.1),
                    cid: Cid::new(expected.0).unwrap(),
                }
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_cid_gets_new_handle() {
        let (service, _) = service();
        service.register(RegisterCidRequest::new("cidX")).await.unwrap();
        let again = service.register(RegisterCidRequest::new("cidX")).await.unwrap();

        assert_eq!(again.handle, Handle::new(1));
        assert_eq!(service.count().await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let (service, _) = service();
        for cid in ["a", "b", "c"] {
            service.register(RegisterCidRequest::new(cid)).await.unwrap();
        }

        assert!(service.get_record(Handle::new(3)).await.unwrap().is_none());
        assert!(service.get_record(Handle::new(1_000_000)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_cid_rejected_without_side_effects() {
        let (service, publisher) = service();
        let mut events = publisher.subscribe();

        let err = service.register(RegisterCidRequest::new("")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(service.count().await.unwrap().count, 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_atomic() {
        let repository = Arc::new(FlakyRepository {
            inner: MemoryRecordRepository::new(),
            fail: AtomicBool::new(false),
        });
        let publisher = Arc::new(BroadcastEventPublisher::new(64));
        let service = service_with(repository.clone(), publisher.clone());
        let mut events = publisher.subscribe();

        service.register(RegisterCidRequest::new("cidA")).await.unwrap();
        events.recv().await.unwrap();

        repository.fail.store(true, Ordering::SeqCst);
        let err = service.register(RegisterCidRequest::new("cidB")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PersistenceFailure(_)));
        assert_eq!(service.count().await.unwrap().count, 1);
        assert!(service.get_record(Handle::new(1)).await.unwrap().is_none());
        assert!(events.try_recv().is_err());

        repository.fail.store(false, Ordering::SeqCst);
        let next = service.register(RegisterCidRequest::new("cidC")).await.unwrap();
        assert_eq!(next.handle, Handle::new(1));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_registration() {
        let service = service_with(
            Arc::new(MemoryRecordRepository::new()),
            Arc::new(FailingPublisher),
        );

        let response = service.register(RegisterCidRequest::new("cidA")).await.unwrap();
        assert_eq!(response.handle, Handle::new(0));
        assert_eq!(service.count().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let (service, _) = service();
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..100)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .register(RegisterCidRequest::new(format!("cid-{}", i)))
                        .await
                })
            })
            .collect();

        let mut issued = Vec::new();
        for task in tasks {
            let response = task.await.unwrap().unwrap();
            issued.push((response.handle.value(), response.cid));
        }
        issued.sort_by_key(|(h, _)| *h);

        let handles: Vec<u64> = issued.iter().map(|(h, _)| *h).collect();
        assert_eq!(handles, (0..100).collect::<Vec<u64>>());
        assert_eq!(service.count().await.unwrap().count, 100);

        for (handle, cid) in issued {
            let record = service.get_record(Handle::new(handle)).await.unwrap().unwrap();
            assert_eq!(record.cid, cid);
        }
    }

    #[tokio::test]
    async fn test_list_records_pagination() {
        let (service, _) = service();
        for i in 0..5 {
            service
                .register(RegisterCidRequest::new(format!("cid-{}", i)))
                .await
                .unwrap();
        }

        let page = service
            .list_records(ListRecordsRequest {
                after: None,
                limit: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.next_after, Some(Handle::new(1)));

        let last = service
            .list_records(ListRecordsRequest {
                after: Some(Handle::new(2)),
                limit: Some(10),
            })
            .await
            .unwrap();
        let handles: Vec<u64> = last.records.iter().map(|r| r.handle.value()).collect();
        assert_eq!(handles, vec![3, 4]);
        assert_eq!(last.next_after, None);

        assert!(matches!(
            service
                .list_records(ListRecordsRequest {
                    after: None,
                    limit: Some(0),
                })
                .await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    /// Poll `register` once, then drop it as a disconnecting client would
    async fn register_then_abandon(service: &DefaultRegistrationService, cid: &str) {
        tokio::select! {
            biased;
            _ = service.register(RegisterCidRequest::new(cid)) => {}
            _ = std::future::ready(()) => {}
        }
    }

    async fn next_event(events: &mut broadcast::Receiver<RegistryEvent>) -> RegistryEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no event within timeout")
            .unwrap()
    }

    #[tokio::test]
    async fn test_abandoned_registration_still_notifies() {
        let (service, publisher) = service();
        let mut events = publisher.subscribe();

        register_then_abandon(&service, "cidA").await;

        let event = next_event(&mut events).await;
        assert_eq!(
            event.event_type,
            EventType::CidRegistered {
                handle: Handle::new(0),
                cid: Cid::new("cidA").unwrap(),
            }
        );
        assert_eq!(service.count().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_abandoned_registration_on_log_backend() {
        let dir = tempfile::tempdir().unwrap();
        let repository = LogRecordRepository::open(dir.path().join("registry.log"))
            .await
            .unwrap();
        let publisher = Arc::new(BroadcastEventPublisher::new(64));
        let service = service_with(Arc::new(repository), publisher.clone());
        let mut events = publisher.subscribe();

        register_then_abandon(&service, "cidA").await;

        let event = next_event(&mut events).await;
        assert!(matches!(
            event.event_type,
            EventType::CidRegistered { handle, .. } if handle == Handle::new(0)
        ));
        assert_eq!(service.count().await.unwrap().count, 1);

        let next = service.register(RegisterCidRequest::new("cidB")).await.unwrap();
        assert_eq!(next.handle, Handle::new(1));
        assert!(matches!(
            next_event(&mut events).await.event_type,
            EventType::CidRegistered { handle, .. } if handle == Handle::new(1)
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let (service, _) = service();
        service.register(RegisterCidRequest::new("cidA")).await.unwrap();

        let health = service.health().await;
        assert!(health.healthy);
        assert_eq!(health.backend, "memory");
        assert_eq!(health.record_count, Some(1));
    }
}
