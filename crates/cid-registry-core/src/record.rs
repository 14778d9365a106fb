//! Registration records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cid::Cid;
use crate::types::Handle;

/// An immutable association between a handle and a content identifier
///
/// Records are created exactly once, when the registry commits a
/// registration, and are never modified or removed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Sequential handle issued by the registry
    pub handle: Handle,

    /// Registered content identifier
    pub cid: Cid,

    /// When the record was committed
    pub registered_at: DateTime<Utc>,
}

impl RegistrationRecord {
    /// Create a record committed now
    pub fn new(handle: Handle, cid: Cid) -> Self {
        Self {
            handle,
            cid,
            registered_at: Utc::now(),
        }
    }

    /// Create a record with an explicit commit timestamp (used when replaying)
    pub fn with_timestamp(handle: Handle, cid: Cid, registered_at: DateTime<Utc>) -> Self {
        Self {
            handle,
            cid,
            registered_at,
        }
    }
}

impl fmt::Display for RegistrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} -> {}", self.handle, self.cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let record = RegistrationRecord::new(Handle::new(2), Cid::new("cidB").unwrap());
        assert_eq!(record.to_string(), "#2 -> cidB");
    }

    #[test]
    fn test_record_json_shape() {
        let record = RegistrationRecord::new(Handle::ZERO, Cid::new("cidA").unwrap());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["handle"], 0);
        assert_eq!(value["cid"], "cidA");
        assert!(value["registered_at"].is_string());
    }
}
