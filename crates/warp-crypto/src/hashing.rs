//! # Hashing
//!
//! Keccak-256 (destination-chain transactions, tracking identifiers) and
//! SHA-256 (warp message identifiers).

use crate::Hash;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
