//! # Warp Crypto
//!
//! Cryptographic primitives used by the warp relay.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `bls` | BLS12-381 (blst, min_pk) | Validator attestations, aggregate signatures |
//! | `ecdsa` | secp256k1 (k256) | Destination-chain transaction signing |
//! | `hashing` | Keccak-256, SHA-256 | Message and tracking identifiers |
//!
//! All functions are pure and deterministic; BLS aggregation is independent
//! of input ordering.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bls;
pub mod ecdsa;
pub mod errors;
pub mod hashing;

/// 32-byte digest.
pub type Hash = [u8; 32];

/// 20-byte account address.
pub type Address = [u8; 20];

// Re-exports
pub use bls::{BlsKeyPair, BlsPublicKey, BlsSignature, PUBLIC_KEY_LEN, SIGNATURE_LEN};
pub use ecdsa::{address_from_pubkey, recover_address, RecoverableSignature, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{keccak256, sha256};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
