//! Content identifiers and their derivation
//!
//! A [`Cid`] is opaque to the registry: apart from rejecting empty values, the
//! registry never interprets it. [`CidFormat`] reports whether the value
//! decodes as a CIDv0 or CIDv1, which strict validation relies on, and
//! [`Cid::derive`] computes the raw-codec sha2-256 CIDv1 of a blob so that
//! identical bytes always yield identical identifiers.

use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RegistryError, Result};

/// Multicodec code for raw binary content
const RAW_CODEC: u64 = 0x55;

/// Recognized content identifier versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CidFormat {
    /// CIDv0: base58btc sha2-256 multihash
    V0,
    /// CIDv1 in any multibase encoding
    V1,
    /// Anything that does not decode as a CID
    Unknown,
}

impl CidFormat {
    /// Classify a raw identifier string by decoding it
    pub fn detect(value: &str) -> Self {
        match ::cid::Cid::try_from(value) {
            Ok(decoded) => match decoded.version() {
                ::cid::Version::V0 => CidFormat::V0,
                ::cid::Version::V1 => CidFormat::V1,
            },
            Err(_) => CidFormat::Unknown,
        }
    }

    /// Whether the format is a recognized CID encoding
    pub fn is_recognized(&self) -> bool {
        !matches!(self, CidFormat::Unknown)
    }
}

impl fmt::Display for CidFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CidFormat::V0 => write!(f, "cidv0"),
            CidFormat::V1 => write!(f, "cidv1"),
            CidFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Content identifier registered against a handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Create a CID, rejecting empty or whitespace-only values
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RegistryError::InvalidCid(
                "CID cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Derive the CIDv1 (raw codec, sha2-256, base32) of a blob
    pub fn derive(data: &[u8]) -> Self {
        let cid = ::cid::Cid::new_v1(RAW_CODEC, Code::Sha2_256.digest(data));
        Self(cid.to_string())
    }

    /// Check whether `data` hashes to this CID
    ///
    /// Any multibase encoding of a raw-codec CID is accepted as long as its
    /// multihash function is one we can compute.
    pub fn matches_content(&self, data: &[u8]) -> bool {
        let Ok(decoded) = ::cid::Cid::try_from(self.0.as_str()) else {
            return false;
        };
        if decoded.codec() != RAW_CODEC {
            return false;
        }

        match Code::try_from(decoded.hash().code()) {
            Ok(code) => code.digest(data) == *decoded.hash(),
            Err(_) => false,
        }
    }

    /// Detected version of this CID
    pub fn format(&self) -> CidFormat {
        CidFormat::detect(&self.0)
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the identifier in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a `Cid` is never empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cid {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Cid::new(s)
    }
}

impl TryFrom<String> for Cid {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Cid::new(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
