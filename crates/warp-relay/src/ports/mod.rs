//! # Ports Module
//!
//! Hexagonal architecture ports for the warp relay.

pub mod outbound;

pub use outbound::{
    send_warp_message_topic, Log, LogFilter, LogSubscription, SourceChainClient,
    TransactionSigner, WarpSignatureClient, SEND_WARP_MESSAGE_EVENT,
};
