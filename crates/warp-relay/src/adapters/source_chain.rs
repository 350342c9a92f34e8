//! In-Memory Source Chain Adapter
//!
//! Implements `SourceChainClient` over a broadcast log bus. Accepts signed
//! `sendWarpMessage` transactions (or direct announcements), keeps every
//! unsigned message it emitted so local validators can sign them by id.

use crate::domain::{
    Address, AddressedPayload, BlockchainId, CodecError, Hash, MessageId, RelayError,
    SendWarpMessageInput, SignedTransaction, UnsignedMessage, MAX_UNSIGNED_PAYLOAD_LEN,
    WARP_PRECOMPILE_ADDRESS,
};
use crate::ports::outbound::{
    send_warp_message_topic, Log, LogFilter, LogSubscription, SourceChainClient,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use warp_crypto::{keccak256, CryptoError};

/// Default number of logs buffered per subscriber.
pub const DEFAULT_LOG_BUFFER: usize = 4096;

/// Rejected transaction submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Malformed transaction: {0}")]
    Decode(#[from] CodecError),

    #[error("Wrong chain id: expected {expected}, got {actual}")]
    WrongChainId { expected: u64, actual: u64 },

    #[error("Transaction does not call the warp precompile")]
    NotWarpCall,

    #[error("Invalid sender signature: {0}")]
    Sender(#[from] CryptoError),

    #[error("Nonce mismatch for {sender}: expected {expected}, got {actual}")]
    Nonce {
        sender: String,
        expected: u64,
        actual: u64,
    },

    #[error("Warp payload of {length} bytes exceeds maximum {max}")]
    PayloadTooLarge { length: usize, max: usize },

    #[error("Chain is shut down")]
    Closed,
}

#[derive(Default)]
struct ChainState {
    block_number: u64,
    messages: HashMap<MessageId, Arc<UnsignedMessage>>,
    nonces: HashMap<Address, u64>,
}

/// Source chain held in process memory.
pub struct InMemorySourceChain {
    network_id: u32,
    blockchain_id: BlockchainId,
    evm_chain_id: u64,
    logs: Mutex<Option<broadcast::Sender<Log>>>,
    log_buffer: usize,
    state: RwLock<ChainState>,
}

impl InMemorySourceChain {
    pub fn new(network_id: u32, blockchain_id: BlockchainId, evm_chain_id: u64) -> Self {
        Self::with_log_buffer(network_id, blockchain_id, evm_chain_id, DEFAULT_LOG_BUFFER)
    }

    pub fn with_log_buffer(
        network_id: u32,
        blockchain_id: BlockchainId,
        evm_chain_id: u64,
        log_buffer: usize,
    ) -> Self {
        let log_buffer = log_buffer.max(1);
        let (sender, _) = broadcast::channel(log_buffer);
        Self {
            network_id,
            blockchain_id,
            evm_chain_id,
            logs: Mutex::new(Some(sender)),
            log_buffer,
            state: RwLock::new(ChainState::default()),
        }
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn blockchain_id(&self) -> BlockchainId {
        self.blockchain_id
    }

    pub fn evm_chain_id(&self) -> u64 {
        self.evm_chain_id
    }

    /// Logs a subscriber may fall behind by before its stream fails.
    pub fn log_buffer(&self) -> usize {
        self.log_buffer
    }

    /// Next nonce the chain expects from `sender`.
    pub fn nonce_of(&self, sender: &Address) -> u64 {
        self.state.read().nonces.get(sender).copied().unwrap_or(0)
    }

    /// Execute a signed `sendWarpMessage` transaction.
    ///
    /// Returns the unsigned message it announced.
    pub fn submit_transaction(&self, raw: &[u8]) -> Result<Arc<UnsignedMessage>, SubmitError> {
        let tx = SignedTransaction::decode(raw)?;
        if tx.tx().chain_id != self.evm_chain_id {
            return Err(SubmitError::WrongChainId {
                expected: self.evm_chain_id,
                actual: tx.tx().chain_id,
            });
        }
        if tx.tx().to != WARP_PRECOMPILE_ADDRESS {
            return Err(SubmitError::NotWarpCall);
        }
        let input = SendWarpMessageInput::unpack(&tx.tx().data)?;
        let sender = tx.sender()?;

        {
            let mut state = self.state.write();
            let expected = state.nonces.get(&sender).copied().unwrap_or(0);
            if tx.nonce() != expected {
                return Err(SubmitError::Nonce {
                    sender: hex::encode(sender),
                    expected,
                    actual: tx.nonce(),
                });
            }
            state.nonces.insert(sender, expected + 1);
        }

        self.emit(sender, input, tx.hash())
    }

    /// Announce a warp message on behalf of `sender` without a transaction.
    pub fn send_warp_message(
        &self,
        sender: Address,
        input: SendWarpMessageInput,
    ) -> Result<Arc<UnsignedMessage>, SubmitError> {
        let tx_hash = keccak256(&input.pack());
        self.emit(sender, input, tx_hash)
    }

    fn emit(
        &self,
        sender: Address,
        input: SendWarpMessageInput,
        tx_hash: Hash,
    ) -> Result<Arc<UnsignedMessage>, SubmitError> {
        let addressed = AddressedPayload::new(
            sender,
            input.destination_chain_id,
            input.destination_address,
            input.payload,
        );
        let payload = addressed.to_bytes();
        if payload.len() > MAX_UNSIGNED_PAYLOAD_LEN {
            return Err(SubmitError::PayloadTooLarge {
                length: payload.len(),
                max: MAX_UNSIGNED_PAYLOAD_LEN,
            });
        }
        let message = Arc::new(UnsignedMessage::new(
            self.network_id,
            self.blockchain_id,
            payload,
        ));

        let block_number = {
            let mut state = self.state.write();
            state.block_number += 1;
            state.messages.insert(message.id(), Arc::clone(&message));
            state.block_number
        };

        let log = Log {
            address: WARP_PRECOMPILE_ADDRESS,
            topics: vec![
                send_warp_message_topic(),
                *addressed.destination_chain_id.as_bytes(),
                pad_address(&addressed.destination_address),
                pad_address(&sender),
            ],
            data: message.bytes().to_vec(),
            block_number,
            tx_hash,
        };

        let logs = self.logs.lock();
        let bus = logs.as_ref().ok_or(SubmitError::Closed)?;
        // No subscribers is fine; the message is still stored.
        let _ = bus.send(log);

        debug!(
            "[source-chain] Announced warp message {} at block {}",
            message.id(),
            block_number
        );
        Ok(message)
    }

    /// Publish an arbitrary log, bypassing message bookkeeping.
    pub fn publish_raw_log(&self, log: Log) {
        if let Some(bus) = self.logs.lock().as_ref() {
            let _ = bus.send(log);
        }
    }

    /// Unsigned message previously announced under `message_id`.
    pub fn get_message(&self, message_id: &MessageId) -> Option<Arc<UnsignedMessage>> {
        self.state.read().messages.get(message_id).cloned()
    }

    pub fn message_count(&self) -> usize {
        self.state.read().messages.len()
    }

    /// End every log stream. Later subscriptions fail.
    pub fn close(&self) {
        if self.logs.lock().take().is_some() {
            info!("[source-chain] Log bus closed");
        }
    }
}

fn pad_address(address: &Address) -> Hash {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

/// Subscription over the broadcast bus.
pub struct BroadcastLogSubscription {
    receiver: Option<broadcast::Receiver<Log>>,
    filter: LogFilter,
}

#[async_trait]
impl LogSubscription for BroadcastLogSubscription {
    async fn next_log(&mut self) -> Result<Option<Log>, RelayError> {
        loop {
            let Some(receiver) = self.receiver.as_mut() else {
                return Ok(None);
            };
            match receiver.recv().await {
                Ok(log) if self.filter.matches(&log) => return Ok(Some(log)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[source-chain] Subscriber lagged, {} logs dropped", skipped);
                    self.receiver = None;
                    return Err(RelayError::Subscription(format!(
                        "subscriber lagged behind the log bus, {} logs dropped",
                        skipped
                    )));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return Ok(None);
                }
            }
        }
    }

    fn unsubscribe(&mut self) {
        self.receiver = None;
    }
}

#[async_trait]
impl SourceChainClient for InMemorySourceChain {
    async fn subscribe_logs(
        &self,
        filter: LogFilter,
    ) -> Result<Box<dyn LogSubscription>, RelayError> {
        let logs = self.logs.lock();
        let bus = logs
            .as_ref()
            .ok_or_else(|| RelayError::Subscription("source chain is closed".to_string()))?;
        debug!(
            "[source-chain] New subscription ({} addresses, buffer {})",
            filter.addresses.len(),
            self.log_buffer
        );
        Ok(Box::new(BroadcastLogSubscription {
            receiver: Some(bus.subscribe()),
            filter,
        }))
    }
}
