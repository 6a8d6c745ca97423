//! Hashing primitives for LinkChain

use sha2::{Digest, Sha256};

/// Raw 32-byte SHA-256 output.
pub type Sha256Hash = [u8; 32];

/// Hashes the concatenation of `parts` in order, with no separators.
pub fn sha256(parts: &[&[u8]]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Lowercase hex rendering of a SHA-256 digest over `parts`.
pub fn sha256_hex(parts: &[&[u8]]) -> String {
    hex::encode(sha256(parts))
}

/// Digest of a block's canonical encoding: the decimal timestamp, the raw
/// payload bytes and the previous block's hex hash, concatenated.
///
/// Every node must produce byte-identical input here, so the timestamp is
/// rendered through `i64`'s `Display` (ASCII digits, optional leading `-`,
/// never padded or locale-formatted).
pub fn block_digest(timestamp: i64, data: &str, previous_hash: &str) -> String {
    let ts = timestamp.to_string();
    sha256_hex(&[ts.as_bytes(), data.as_bytes(), previous_hash.as_bytes()])
}
