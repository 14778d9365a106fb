//! Registration notifications
//!
//! Every successful registration produces a [`RegistryEvent`] that external
//! indexers can consume. Delivery is at-least-once; consumers deduplicate by
//! handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cid::Cid;
use crate::record::RegistrationRecord;
use crate::types::Handle;

/// Types of events that can occur in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    /// A content identifier was registered
    CidRegistered {
        /// Handle issued for the registration
        handle: Handle,
        /// Registered content identifier
        cid: Cid,
    },
}

impl EventType {
    /// Get a human-readable name for the event type
    pub fn event_name(&self) -> &'static str {
        match self {
            EventType::CidRegistered { .. } => "cid_registered",
        }
    }

    /// Get the handle associated with this event
    pub fn handle(&self) -> Handle {
        match self {
            EventType::CidRegistered { handle, .. } => *handle,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// A registry event with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// Event type and details
    #[serde(flatten)]
    pub event_type: EventType,

    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

impl RegistryEvent {
    /// Event announcing a committed record
    ///
    /// The event timestamp is the record's commit time.
    pub fn registered(record: &RegistrationRecord) -> Self {
        Self {
            event_type: EventType::CidRegistered {
                handle: record.handle,
                cid: record.cid.clone(),
            },
            timestamp: record.registered_at,
        }
    }

    /// Get the event name
    pub fn event_name(&self) -> &'static str {
        self.event_type.event_name()
    }

    /// Get the associated handle
    pub fn handle(&self) -> Handle {
        self.event_type.handle()
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistryEvent({} at {}, handle={})",
            self.event_name(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.handle()
        )
    }
}
