//! # Warp Relay
//!
//! Relays warp messages from a source chain to a destination chain.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A message emitted on the source chain is only accepted by the
//! destination once validators holding enough stake have signed it. The
//! relay:
//! - watches the source chain for `SendWarpMessage` announcements
//! - collects a BLS signature from each validator
//! - aggregates signatures until the quorum weight is reached
//! - wraps each certified message in a signed predicate transaction
//!
//! ## Pipeline
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | `AttestationSource` | source-chain logs | `PartialAttestation` |
//! | `QuorumAggregator` | `PartialAttestation` | `CertifiedMessage` |
//! | `CertifiedMessageTransmitter` | `CertifiedMessage` | `RelayTx` |
//!
//! ## Module Structure
//!
//! ```text
//! warp-relay/
//! ├── domain/          # Messages, certificates, aggregation, transactions
//! ├── ports/           # SourceChainClient, WarpSignatureClient, TransactionSigner
//! ├── adapters/        # In-memory chain, local signature service, local signer
//! ├── service/         # Source, aggregator, transmitter, pipeline
//! └── config.rs        # RelayConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    InMemorySourceChain, LocalSignatureService, LocalTxSigner, SignatureBehavior, SubmitError,
    DEFAULT_LOG_BUFFER,
};
pub use config::{AggregatorConfig, ChannelConfig, ConfigError, RelayConfig, TransmitterConfig};
pub use domain::{
    AddressedPayload, BitSetSignature, BlockchainId, CertificateError, CertifiedMessage,
    CodecError, DynamicFeeTx, MessageId, NodeId, PartialAttestation, RelayError, RelayTx,
    SendWarpMessageInput, SignedTransaction, SignerBitSet, TaskExit, TestPayload,
    UnsignedMessage, Validator, ValidatorSet, WARP_PRECOMPILE_ADDRESS,
};
pub use ports::{LogFilter, SourceChainClient, TransactionSigner, WarpSignatureClient};
pub use service::{
    shutdown_channel, AttestationSource, CertifiedMessageTransmitter, PipelineHandle,
    PipelineReport, QuorumAggregator, RelayPipeline, ShutdownSignal, ShutdownTrigger,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
