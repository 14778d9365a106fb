//! Core domain models and types for the CID Registry
//!
//! This crate contains the data structures shared by every layer of the
//! registry: sequential handles, content identifiers, registration records,
//! and the notification events published after each registration.

pub mod cid;
pub mod error;
pub mod event;
pub mod record;
pub mod types;

// Re-exports for convenience
pub use crate::cid::{Cid, CidFormat};
pub use error::{RegistryError, Result};
pub use event::{EventType, RegistryEvent};
pub use record::RegistrationRecord;
pub use types::Handle;
