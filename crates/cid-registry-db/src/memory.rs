//! In-memory implementation of RecordRepository
//!
//! Suitable for tests and ephemeral deployments. State is lost on restart
//! unless seeded with [`MemoryRecordRepository::from_records`].

use async_trait::async_trait;
use cid_registry_core::{Cid, Handle, RegistrationRecord};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::DbResult;
use crate::repository::{next_handle, verify_sequence, ListQuery, RecordRepository};

/// In-memory registration ledger
#[derive(Debug, Default)]
pub struct MemoryRecordRepository {
    records: RwLock<Vec<RegistrationRecord>>,
}

impl MemoryRecordRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a repository by replaying previously committed records
    ///
    /// Records must be the contiguous sequence `0..n` in handle order.
    pub fn from_records(records: Vec<RegistrationRecord>) -> DbResult<Self> {
        verify_sequence(&records)?;
        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    #[instrument(skip(self), fields(cid = %cid))]
    async fn append(&self, cid: Cid) -> DbResult<RegistrationRecord> {
        let mut records = self.records.write().await;

        let handle = next_handle(&records)?;
        let record = RegistrationRecord::new(handle, cid);
        records.push(record.clone());

        debug!(handle = %handle, "Record appended");
        Ok(record)
    }

    async fn find_by_handle(&self, handle: Handle) -> DbResult<Option<RegistrationRecord>> {
        let records = self.records.read().await;
        Ok(usize::try_from(handle.value())
            .ok()
            .and_then(|idx| records.get(idx))
            .cloned())
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn list(&self, query: &ListQuery) -> DbResult<Vec<RegistrationRecord>> {
        let records = self.records.read().await;
        let start = usize::try_from(query.start()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);

        Ok(records.iter().skip(start).take(limit).cloned().collect())
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cid(value: &str) -> Cid {
        Cid::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let repo = MemoryRecordRepository::new();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.find_by_handle(Handle::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sequential_handles() {
        let repo = MemoryRecordRepository::new();

        let a = repo.append(cid("cidA")).await.unwrap();
        let b = repo.append(cid("cidB")).await.unwrap();

        assert_eq!(a.handle, Handle::new(0));
        assert_eq!(b.handle, Handle::new(1));
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(
            repo.find_by_handle(Handle::new(1)).await.unwrap().unwrap().cid,
            cid("cidB")
        );
    }

    #[tokio::test]
    async fn test_duplicates_get_distinct_handles() {
        let repo = MemoryRecordRepository::new();

        let first = repo.append(cid("cidX")).await.unwrap();
        let second = repo.append(cid("cidX")).await.unwrap();

        assert_eq!(first.handle, Handle::new(0));
        assert_eq!(second.handle, Handle::new(1));
    }

    #[tokio::test]
    async fn test_concurrent_appends_have_no_gaps() {
        let repo = Arc::new(MemoryRecordRepository::new());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.append(cid(&format!("cid-{}", i))).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap().handle.value());
        }
        handles.sort_unstable();

        assert_eq!(handles, (0..64).collect::<Vec<u64>>());
        assert_eq!(repo.count().await.unwrap(), 64);
    }

    #[tokio::test]
    async fn test_replay_from_records() {
        let records = vec![
            RegistrationRecord::new(Handle::new(0), cid("cidA")),
            RegistrationRecord::new(Handle::new(1), cid("cidB")),
        ];
        let repo = MemoryRecordRepository::from_records(records).unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(
            repo.find_by_handle(Handle::ZERO).await.unwrap().unwrap().cid,
            cid("cidA")
        );

        let next = repo.append(cid("cidC")).await.unwrap();
        assert_eq!(next.handle, Handle::new(2));
    }

    #[tokio::test]
    async fn test_replay_rejects_gaps() {
        let records = vec![RegistrationRecord::new(Handle::new(1), cid("cidB"))];
        assert!(MemoryRecordRepository::from_records(records).is_err());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let repo = MemoryRecordRepository::new();
        for i in 0..5 {
            repo.append(cid(&format!("cid-{}", i))).await.unwrap();
        }

        let page = repo
            .list(&ListQuery::new().after(Handle::new(1)).limit(2))
            .await
            .unwrap();
        let handles: Vec<u64> = page.iter().map(|r| r.handle.value()).collect();
        assert_eq!(handles, vec![2, 3]);

        let tail = repo
            .list(&ListQuery::new().after(Handle::new(4)))
            .await
            .unwrap();
        assert!(tail.is_empty());
    }
}
