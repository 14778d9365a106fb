//! Content store client
//!
//! A [`ContentStore`] accepts a blob and answers with the CID it is stored
//! under. The registry never reads content back; it only records the CID.

use async_trait::async_trait;
use cid_registry_core::Cid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Default largest blob accepted by the in-memory store (8 MiB)
pub const DEFAULT_MAX_BLOB_BYTES: usize = 8 * 1024 * 1024;

/// Content-addressed blob storage
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its CID
    ///
    /// Fails with `StoreUnavailable` when the store cannot be reached and
    /// `UploadRejected` when it refuses the blob.
    async fn upload(&self, blob: &[u8]) -> ServiceResult<Cid>;

    /// Short store name used in logs
    fn name(&self) -> &'static str;
}

/// Settings for [`MemoryContentStore`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentStoreConfig {
    /// Largest accepted blob in bytes
    pub max_blob_bytes: usize,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

/// In-process content store keyed by derived CIDv1
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    config: ContentStoreConfig,
    blobs: RwLock<HashMap<Cid, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryContentStore {
    /// Create an empty store
    pub fn new(config: ContentStoreConfig) -> Self {
        Self {
            config,
            blobs: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the store going away (or coming back)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Retrieve a stored blob
    pub async fn fetch(&self, cid: &Cid) -> Option<Vec<u8>> {
        self.blobs.read().await.get(cid).cloned()
    }

    /// Number of distinct blobs held
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    #[instrument(skip(self, blob), fields(size = blob.len()))]
    async fn upload(&self, blob: &[u8]) -> ServiceResult<Cid> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceError::StoreUnavailable(
                "content store is offline".to_string(),
            ));
        }

        if blob.is_empty() {
            return Err(ServiceError::UploadRejected("blob is empty".to_string()));
        }

        if blob.len() > self.config.max_blob_bytes {
            return Err(ServiceError::UploadRejected(format!(
                "blob of {} bytes exceeds limit of {} bytes",
                blob.len(),
                self.config.max_blob_bytes
            )));
        }

        let cid = Cid::derive(blob);
        self.blobs
            .write()
            .await
            .entry(cid.clone())
            .or_insert_with(|| blob.to_vec());

        debug!(cid = %cid, "Blob stored");
        Ok(cid)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
