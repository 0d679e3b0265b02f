//! Deterministic fingerprints
//!
//! Cache keys and ETags are SHA-256 digests rendered as lowercase hex. Field
//! values are length-prefixed before hashing so that no two distinct field
//! lists can serialize to the same byte stream.

use sha2::{Digest, Sha256};

/// Number of hex characters kept for content fingerprints (128 bits)
const CONTENT_FINGERPRINT_LEN: usize = 32;

/// Incremental builder for a fingerprint over named fields
///
/// Callers are expected to add fields in a fixed order; the builder does not
/// sort them.
#[derive(Clone)]
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    /// Start a fingerprint under a versioned namespace
    pub fn new(namespace: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        Self { hasher }
    }

    pub fn field(mut self, name: &str, value: impl AsRef<[u8]>) -> Self {
        let value = value.as_ref();
        self.hasher.update(name.as_bytes());
        self.hasher.update([b'=']);
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self.hasher.update([0u8]);
        self
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Fingerprint of a rendered payload, suitable as a strong ETag value
pub fn content_fingerprint(payload: &[u8]) -> String {
    let mut encoded = hex::encode(Sha256::digest(payload));
    encoded.truncate(CONTENT_FINGERPRINT_LEN);
    encoded
}
