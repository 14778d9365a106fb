//! SQLite implementation of RecordRepository
//!
//! The ledger is a single `registrations` table keyed by handle. The next
//! handle is derived from the table itself by the insert statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cid_registry_core::{Cid, Handle, RegistrationRecord, RegistryError};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::{ListQuery, RecordRepository};

/// SQLite-backed registration ledger
#[derive(Debug)]
pub struct SqliteRecordRepository {
    pool: SqlitePool,
    // Serializes appends issued through this repository
    writer: Mutex<()>,
}

impl SqliteRecordRepository {
    /// Create a new repository over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Mutex::new(()),
        }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    #[instrument(skip(self), fields(cid = %cid))]
    async fn append(&self, cid: Cid) -> DbResult<RegistrationRecord> {
        let _guard = self.writer.lock().await;

        // Handle derivation and insert are one statement, so an aborted
        // commit cannot consume a handle
        let registered_at = Utc::now();
        let handle: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO registrations (handle, cid, registered_at)
            SELECT COALESCE(MAX(handle) + 1, 0), ?1, ?2 FROM registrations
            RETURNING handle
            "#,
        )
        .bind(cid.as_str())
        .bind(registered_at)
        .fetch_one(&self.pool)
        .await?;

        let record = RegistrationRecord::with_timestamp(handle_from_db(handle)?, cid, registered_at);

        debug!(handle = %record.handle, "Record committed");
        Ok(record)
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn find_by_handle(&self, handle: Handle) -> DbResult<Option<RegistrationRecord>> {
        let Ok(key) = i64::try_from(handle.value()) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            SELECT handle, cid, registered_at
            FROM registrations
            WHERE handle = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn count(&self) -> DbResult<u64> {
        let next: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(handle) + 1, 0) FROM registrations")
                .fetch_one(&self.pool)
                .await?;

        Ok(handle_from_db(next)?.value())
    }

    async fn list(&self, query: &ListQuery) -> DbResult<Vec<RegistrationRecord>> {
        let start = i64::try_from(query.start()).unwrap_or(i64::MAX);
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT handle, cid, registered_at
            FROM registrations
            WHERE handle >= ?1
            ORDER BY handle ASC
            LIMIT ?2
            "#,
        )
        .bind(start)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Connection(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn handle_from_db(value: i64) -> DbResult<Handle> {
    u64::try_from(value)
        .map(Handle::new)
        .map_err(|_| DbError::InvalidData(format!("Negative handle in database: {}", value)))
}

fn row_to_record(row: SqliteRow) -> DbResult<RegistrationRecord> {
    let handle: i64 = row.try_get("handle")?;
    let cid: String = row.try_get("cid")?;
    let registered_at: DateTime<Utc> = row.try_get("registered_at")?;

    let cid = Cid::new(cid).map_err(|e: RegistryError| DbError::InvalidData(e.to_string()))?;

    Ok(RegistrationRecord::with_timestamp(
        handle_from_db(handle)?,
        cid,
        registered_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, PoolConfig};
    use std::sync::Arc;

    async fn repository() -> SqliteRecordRepository {
        let pool = create_pool(&PoolConfig::new("sqlite::memory:")).await.unwrap();
        SqliteRecordRepository::new(pool)
    }

    fn cid(value: &str) -> Cid {
        Cid::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let repo = repository().await;
        assert_eq!(repo.count().await.unwrap(), 0);

        let a = repo.append(cid("cidA")).await.unwrap();
        let b = repo.append(cid("cidB")).await.unwrap();
        assert_eq!(a.handle, Handle::new(0));
        assert_eq!(b.handle, Handle::new(1));
        assert_eq!(repo.count().await.unwrap(), 2);

        let found = repo.find_by_handle(Handle::new(1)).await.unwrap().unwrap();
        assert_eq!(found.cid, cid("cidB"));
        assert!(repo.find_by_handle(Handle::new(2)).await.unwrap().is_none());
        assert!(repo.find_by_handle(Handle::new(u64::MAX)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_cids() {
        let repo = repository().await;
        repo.append(cid("cidX")).await.unwrap();
        let second = repo.append(cid("cidX")).await.unwrap();
        assert_eq!(second.handle, Handle::new(1));
    }

    #[tokio::test]
    async fn test_list_in_handle_order() {
        let repo = repository().await;
        for i in 0..4 {
            repo.append(cid(&format!("cid-{}", i))).await.unwrap();
        }

        let page = repo
            .list(&ListQuery::new().after(Handle::new(0)).limit(2))
            .await
            .unwrap();
        let handles: Vec<u64> = page.iter().map(|r| r.handle.value()).collect();
        assert_eq!(handles, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rows_are_immutable() {
        let repo = repository().await;
        repo.append(cid("cidA")).await.unwrap();

        let result = sqlx::query("UPDATE registrations SET cid = 'other' WHERE handle = 0")
            .execute(repo.pool())
            .await;
        assert!(result.is_err());

        let result = sqlx::query("DELETE FROM registrations")
            .execute(repo.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failed_insert_consumes_no_handle() {
        let repo = repository().await;
        repo.append(cid("cidA")).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER refuse_write BEFORE INSERT ON registrations
            WHEN NEW.cid = 'refused'
            BEGIN
                SELECT RAISE(ABORT, 'write refused');
            END
            "#,
        )
        .execute(repo.pool())
        .await
        .unwrap();

        assert!(repo.append(cid("refused")).await.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.find_by_handle(Handle::new(1)).await.unwrap().is_none());

        let next = repo.append(cid("cidB")).await.unwrap();
        assert_eq!(next.handle, Handle::new(1));
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let repo = Arc::new(repository().await);

        let tasks: Vec<_> = (0..16)
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
        assert_eq!(handles, (0..16).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("registry.db").display());

        {
            let pool = create_pool(&PoolConfig::new(&url)).await.unwrap();
            let repo = SqliteRecordRepository::new(pool.clone());
            repo.append(cid("cidA")).await.unwrap();
            repo.append(cid("cidB")).await.unwrap();
            pool.close().await;
        }

        let pool = create_pool(&PoolConfig::new(&url)).await.unwrap();
        let repo = SqliteRecordRepository::new(pool);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.append(cid("cidC")).await.unwrap().handle, Handle::new(2));
    }
}
