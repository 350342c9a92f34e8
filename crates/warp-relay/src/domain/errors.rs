//! # Domain Errors
//!
//! Error types for the warp relay pipeline.
//!
//! Every variant of [`RelayError`] is fatal to the task that raises it; the
//! task exits and drops the channel it owns so downstream stages observe
//! end-of-stream. Cancellation is not an error (see `TaskExit`).

use super::value_objects::{MessageId, NodeId};
use thiserror::Error;
use warp_crypto::CryptoError;

/// Hash type (32 bytes).
pub type Hash = [u8; 32];

/// Address type (20 bytes).
pub type Address = [u8; 20];

/// Wire decoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before the field could be read.
    #[error("Insufficient length: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    InsufficientLength {
        /// Offset of the field
        offset: usize,
        /// Bytes the field needs
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Unknown codec version.
    #[error("Unknown codec version: {0}")]
    UnknownCodecVersion(u16),

    /// Unknown type discriminator.
    #[error("Unknown type id: {0}")]
    UnknownTypeId(u32),

    /// Bytes left over after decoding.
    #[error("Trailing bytes: {0}")]
    TrailingBytes(usize),

    /// Length prefix exceeds the allowed maximum.
    #[error("Length {length} exceeds maximum {max}")]
    LengthTooLarge {
        /// Declared length
        length: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Access list has no predicate for the requested address.
    #[error("Missing predicate")]
    MissingPredicate,

    /// Predicate padding is malformed.
    #[error("Invalid predicate padding")]
    InvalidPredicatePadding,

    /// Calldata does not start with the expected function selector.
    #[error("Unexpected function selector")]
    InvalidSelector,

    /// ABI word out of range or non-canonical.
    #[error("Invalid ABI encoding")]
    InvalidAbiEncoding,

    /// RLP decoding failed.
    #[error("Invalid RLP: {0}")]
    Rlp(String),

    /// Fixed-layout payload has the wrong size.
    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidPayloadLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}

/// Certificate construction and verification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CertificateError {
    /// No signer bit is set.
    #[error("Signer set is empty")]
    EmptySignerSet,

    /// Bit set for an ordinal outside the validator set.
    #[error("Signer ordinal {ordinal} is outside the validator set of {set_size}")]
    InvalidSigner {
        /// Offending ordinal
        ordinal: usize,
        /// Size of the validator set
        set_size: usize,
    },

    /// Signers do not carry enough weight.
    #[error("Insufficient weight: have {have}, need {need}")]
    InsufficientWeight {
        /// Weight of the signer set
        have: u64,
        /// Required quorum weight
        need: u64,
    },

    /// Aggregate signature bytes are not a curve point.
    #[error("Malformed aggregate signature")]
    MalformedSignature,

    /// Aggregate signature does not verify.
    #[error("Aggregate signature verification failed")]
    InvalidSignature,

    /// Encoding is malformed.
    #[error("Malformed certificate: {0}")]
    Codec(#[from] CodecError),
}

/// Relay pipeline errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Raw event could not be decoded into an unsigned message.
    #[error("Failed to parse unsigned warp message: {0}")]
    Parse(#[source] CodecError),

    /// Validator returned bytes that are not a BLS signature.
    #[error("Failed to parse signature from {node_id}: {source}")]
    SignatureParse {
        /// Validator that produced the bytes
        node_id: NodeId,
        /// Underlying crypto error
        #[source]
        source: CryptoError,
    },

    /// Signature request to a validator failed.
    #[error("Signature request to {node_id} for {message_id} failed: {reason}")]
    SignatureRequest {
        /// Validator queried
        node_id: NodeId,
        /// Message requested
        message_id: MessageId,
        /// Failure reason
        reason: String,
    },

    /// Log subscription could not be established.
    #[error("Log subscription failed: {0}")]
    Subscription(String),

    /// Signature from a validator outside the configured set.
    #[error("Received signature from unknown validator {node_id}")]
    UnknownValidator {
        /// Offending signer
        node_id: NodeId,
    },

    /// BLS aggregation failed.
    #[error("Failed to aggregate BLS signatures for {message_id}: {source}")]
    Aggregation {
        /// Message being certified
        message_id: MessageId,
        /// Underlying crypto error
        #[source]
        source: CryptoError,
    },

    /// Certified message could not be constructed.
    #[error("Failed to construct warp message {message_id}: {source}")]
    MessageConstruction {
        /// Message being certified
        message_id: MessageId,
        /// Underlying certificate error
        #[source]
        source: CertificateError,
    },

    /// Certified message payload is not an addressed payload.
    #[error("Failed to parse addressed payload of {message_id}: {source}")]
    PayloadParse {
        /// Certified message
        message_id: MessageId,
        /// Underlying codec error
        #[source]
        source: CodecError,
    },

    /// A pipeline task panicked or was aborted.
    #[error("Pipeline task {task} aborted: {reason}")]
    TaskAborted {
        /// Task name
        task: &'static str,
        /// Join failure
        reason: String,
    },

    /// Transaction signing failed.
    #[error("Failed to sign relay transaction (nonce {nonce}): {reason}")]
    Signing {
        /// Nonce of the transaction
        nonce: u64,
        /// Failure reason
        reason: String,
    },

    /// No nonce left below `u64::MAX` (EIP-2681).
    #[error("Relay nonce space exhausted at {nonce}")]
    NonceExhausted {
        /// Nonce that would have been used
        nonce: u64,
    },

    /// Configuration rejected at startup.
    #[error("Invalid relay configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}
