//! SHA-256 hashing and constant-time verification.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// Compute the SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    digest.into()
}

/// Compute the SHA-256 hash and return it as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compare two byte slices in constant time.
///
/// Length mismatch returns false without leaking where the inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Verify that data matches the expected hex-encoded SHA-256 hash.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> bool {
    let actual = sha256_hex(data);
    constant_time_eq(actual.as_bytes(), expected_hex.as_bytes())
}

/// Verify the integrity of a data chunk before reassembly.
pub fn verify_chunk_integrity(chunk: &[u8], expected_hash: &str) -> Result<()> {
    if !verify_hash(chunk, expected_hash) {
        return Err(Error::ChunkIntegrity);
    }
    Ok(())
}
