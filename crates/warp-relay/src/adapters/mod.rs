//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-process implementations of the outbound ports, used by the
//! simulation harness and the tests.

mod signature_service;
mod source_chain;
mod tx_signer;

pub use signature_service::{LocalSignatureService, SignatureBehavior};
pub use source_chain::{
    BroadcastLogSubscription, InMemorySourceChain, SubmitError, DEFAULT_LOG_BUFFER,
};
pub use tx_signer::LocalTxSigner;
