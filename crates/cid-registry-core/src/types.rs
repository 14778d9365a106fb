//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Sequential registration handle
///
/// Handles are issued by the registry in strictly increasing order starting
/// at zero. A handle is never reused, even across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The first handle issued by an empty registry
    pub const ZERO: Handle = Handle(0);

    /// Create a handle from its numeric value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The handle issued immediately after this one
    pub fn next(&self) -> Result<Self, RegistryError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(RegistryError::HandleOverflow)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl FromStr for Handle {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| RegistryError::InvalidHandle(format!("{}: {}", s, e)))
    }
}
