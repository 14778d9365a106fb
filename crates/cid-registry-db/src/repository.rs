//! Repository trait abstractions for registration persistence
//!
//! This module defines the RecordRepository trait that abstracts the
//! append-only ledger, allowing for different backends (in-memory,
//! append-only log file, SQLite).

use async_trait::async_trait;
use cid_registry_core::{Cid, Handle, RegistrationRecord};

use crate::error::DbResult;

/// Default number of records returned by a listing
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// Maximum number of records returned by a single listing
pub const MAX_LIST_LIMIT: u64 = 1000;

/// Query parameters for tailing the registration log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    /// Only return records with a handle strictly greater than this one
    pub after: Option<Handle>,

    /// Maximum number of records to return
    pub limit: u64,
}

impl ListQuery {
    /// Create a new query starting at handle zero with the default limit
    pub fn new() -> Self {
        Self {
            after: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }

    /// Start after the given handle
    pub fn after(mut self, handle: Handle) -> Self {
        self.after = Some(handle);
        self
    }

    /// Set pagination limit, clamped to `1..=MAX_LIST_LIMIT`
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit.clamp(1, MAX_LIST_LIMIT);
        self
    }

    /// First handle included in the result
    pub fn start(&self) -> u64 {
        self.after.map(|h| h.value().saturating_add(1)).unwrap_or(0)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Repository trait for the registration ledger
///
/// Implementations must be thread-safe (Send + Sync) and must serialize
/// handle assignment: concurrent `append` calls never receive the same
/// handle, and the counter advances only once the record is durably stored.
/// There is deliberately no update or delete operation.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Append a CID to the ledger, issuing the next handle
    ///
    /// # Returns
    /// * `Ok(RegistrationRecord)` - The committed record
    /// * `Err(DbError)` - The commit failed; no handle was consumed
    async fn append(&self, cid: Cid) -> DbResult<RegistrationRecord>;

    /// Look up the record for a handle
    ///
    /// Returns `Ok(None)` for handles that have not been issued.
    async fn find_by_handle(&self, handle: Handle) -> DbResult<Option<RegistrationRecord>>;

    /// Number of records ever registered, which is also the next handle
    async fn count(&self) -> DbResult<u64>;

    /// Records in handle order, for indexers tailing the ledger
    async fn list(&self, query: &ListQuery) -> DbResult<Vec<RegistrationRecord>>;

    /// Health check for the backing store
    async fn health_check(&self) -> DbResult<()>;

    /// Short backend name used in logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Handle issued after the last committed record
pub(crate) fn next_handle(records: &[RegistrationRecord]) -> DbResult<Handle> {
    match records.last() {
        Some(last) => Ok(last.handle.next()?),
        None => Ok(Handle::ZERO),
    }
}

/// Check that replayed records form the contiguous sequence `0..n`
pub fn verify_sequence(records: &[RegistrationRecord]) -> DbResult<()> {
    for (expected, record) in records.iter().enumerate() {
        if record.handle.value() != expected as u64 {
            return Err(crate::error::DbError::InvalidData(format!(
                "expected handle {} but found {}",
                expected, record.handle
            )));
        }
    }
    Ok(())
}
