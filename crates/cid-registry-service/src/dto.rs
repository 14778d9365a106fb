//! Data Transfer Objects (DTOs) for the service layer
//!
//! Request and response types used at service boundaries.

use chrono::{DateTime, Utc};
use cid_registry_core::{Cid, Handle, RegistrationRecord};
use serde::{Deserialize, Serialize};

// ============================================================================
// Registration DTOs
// ============================================================================

/// Request to register a CID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCidRequest {
    /// Content identifier as supplied by the caller
    pub cid: String,
}

impl RegisterCidRequest {
    /// Create a request
    pub fn new(cid: impl Into<String>) -> Self {
        Self { cid: cid.into() }
    }
}

/// A committed registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// Issued handle
    pub handle: Handle,

    /// Registered content identifier
    pub cid: Cid,

    /// Commit time
    pub registered_at: DateTime<Utc>,
}

impl From<RegistrationRecord> for RegistrationResponse {
    fn from(record: RegistrationRecord) -> Self {
        Self {
            handle: record.handle,
            cid: record.cid,
            registered_at: record.registered_at,
        }
    }
}

// ============================================================================
// Listing DTOs
// ============================================================================

/// Request a page of records in handle order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecordsRequest {
    /// Only return records after this handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Handle>,

    /// Maximum number of records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// A page of records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    /// Records in ascending handle order
    pub records: Vec<RegistrationResponse>,

    /// Number of records registered so far
    pub total: u64,

    /// Pass as `after` to fetch the next page; absent when caught up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_after: Option<Handle>,
}

/// Number of registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Records registered so far, which is also the next handle
    pub count: u64,
}

// ============================================================================
// Upload DTOs
// ============================================================================

/// Outcome of uploading a blob and registering its CID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Issued handle
    pub handle: Handle,

    /// CID assigned by the content store
    pub cid: Cid,

    /// Size of the uploaded blob
    pub size_bytes: u64,
}

// ============================================================================
// Health DTOs
// ============================================================================

/// Health of the registry's storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryHealth {
    /// Backend name (memory, log, sqlite)
    pub backend: String,

    /// Whether the backend responded
    pub healthy: bool,

    /// Failure detail, when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Number of records registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
}
