//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key or signature length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Signature bytes do not decode to a curve point
    #[error("Invalid signature")]
    InvalidSignature,

    /// Public key bytes do not decode to a curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Cannot aggregate an empty list
    #[error("Cannot aggregate empty {0} list")]
    EmptyAggregation(&'static str),

    /// BLS aggregation failed (a point failed the subgroup check)
    #[error("BLS aggregation failed")]
    AggregationFailed,

    /// ECDSA signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Public key recovery failed
    #[error("Failed to recover public key")]
    RecoveryFailed,
}
