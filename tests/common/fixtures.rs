//! Test fixtures
//!
//! Sample content identifiers used across integration tests.

/// A CIDv0 (base58btc sha2-256 multihash)
pub const CID_V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

/// A CIDv1 in base32
pub const CID_V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

/// Distinct opaque CIDs for bulk registration
pub fn numbered_cids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("cid-{:04}", i)).collect()
}
