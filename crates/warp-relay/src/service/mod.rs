//! # Service Layer
//!
//! The three long-running pipeline stages and the wiring that connects
//! them.

pub mod aggregator;
pub mod pipeline;
pub mod shutdown;
pub mod source;
pub mod transmitter;

pub use aggregator::QuorumAggregator;
pub use pipeline::{PipelineHandle, PipelineReport, RelayPipeline, CERTIFIED_CHANNEL_CAPACITY};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use source::AttestationSource;
pub use transmitter::{CertifiedMessageTransmitter, TX_CHANNEL_CAPACITY};
