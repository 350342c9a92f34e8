//! # Outbound Ports
//!
//! Traits for the relay's external dependencies: the source chain's event
//! stream, per-validator signature services and the transaction signer.

use crate::domain::{
    Address, DynamicFeeTx, Hash, MessageId, NodeId, RelayError, SignedTransaction,
    WARP_PRECOMPILE_ADDRESS,
};
use async_trait::async_trait;
use warp_crypto::keccak256;

/// Solidity signature of the warp precompile's announcement event.
pub const SEND_WARP_MESSAGE_EVENT: &str = "SendWarpMessage(bytes32,address,address,bytes)";

/// Topic 0 of a `SendWarpMessage` log.
pub fn send_warp_message_topic() -> Hash {
    keccak256(SEND_WARP_MESSAGE_EVENT.as_bytes())
}

/// Source-chain log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Unindexed data; for warp announcements, the unsigned message bytes.
    pub data: Vec<u8>,
    /// Block that included the log.
    pub block_number: u64,
    /// Transaction that emitted the log.
    pub tx_hash: Hash,
}

/// Log subscription filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Emitting contracts of interest; empty matches everything.
    pub addresses: Vec<Address>,
}

impl LogFilter {
    /// Logs emitted by the warp precompile.
    pub fn warp_messages() -> Self {
        Self {
            addresses: vec![WARP_PRECOMPILE_ADDRESS],
        }
    }

    pub fn matches(&self, log: &Log) -> bool {
        self.addresses.is_empty() || self.addresses.contains(&log.address)
    }
}

/// Live log stream.
#[async_trait]
pub trait LogSubscription: Send {
    /// Next matching log, or `None` once the stream has ended.
    ///
    /// Errors when logs were lost, since skipped announcements would never
    /// be attested.
    async fn next_log(&mut self) -> Result<Option<Log>, RelayError>;

    /// Stop the stream. Further `next_log` calls return `None`.
    fn unsubscribe(&mut self);
}

/// Source-chain client - outbound port.
#[async_trait]
pub trait SourceChainClient: Send + Sync {
    /// Subscribe to logs matching `filter`.
    async fn subscribe_logs(
        &self,
        filter: LogFilter,
    ) -> Result<Box<dyn LogSubscription>, RelayError>;
}

/// Per-validator warp signature service - outbound port.
#[async_trait]
pub trait WarpSignatureClient: Send + Sync {
    /// Validator this client talks to.
    fn node_id(&self) -> NodeId;

    /// Raw BLS signature bytes of the validator over the message.
    async fn get_signature(&self, message_id: MessageId) -> Result<Vec<u8>, RelayError>;
}

/// Destination-chain transaction signer - outbound port.
pub trait TransactionSigner: Send + Sync {
    /// Address that signs (and pays for) outbound transactions.
    fn sender(&self) -> Address;

    fn sign(&self, tx: DynamicFeeTx) -> Result<SignedTransaction, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_from(address: Address) -> Log {
        Log {
            address,
            topics: vec![send_warp_message_topic()],
            data: vec![],
            block_number: 1,
            tx_hash: [0; 32],
        }
    }

    #[test]
    fn test_warp_filter_matches_precompile_only() {
        let filter = LogFilter::warp_messages();
        assert!(filter.matches(&log_from(WARP_PRECOMPILE_ADDRESS)));
        assert!(!filter.matches(&log_from([1; 20])));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(LogFilter::default().matches(&log_from([1; 20])));
    }
}
