//! # Certified-Message Transmitter
//!
//! Turns each certified message into a signed predicate transaction for the
//! destination chain. The nonce starts at the configured value and advances
//! by one per emitted transaction; this task is its only writer.

use super::shutdown::ShutdownSignal;
use crate::config::TransmitterConfig;
use crate::domain::{
    AddressedPayload, CertifiedMessage, DynamicFeeTx, FeePolicy, RelayError, RelayTx, TaskExit,
};
use crate::ports::outbound::TransactionSigner;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Capacity of the outbound transaction channel.
pub const TX_CHANNEL_CAPACITY: usize = 1;

pub struct CertifiedMessageTransmitter {
    chain_id: u64,
    nonce: u64,
    fees: FeePolicy,
    signer: Arc<dyn TransactionSigner>,
    input: mpsc::Receiver<CertifiedMessage>,
    output: mpsc::Sender<RelayTx>,
}

impl CertifiedMessageTransmitter {
    /// Build the transmitter and the receiver its transactions arrive on.
    pub fn new(
        config: &TransmitterConfig,
        signer: Arc<dyn TransactionSigner>,
        input: mpsc::Receiver<CertifiedMessage>,
    ) -> (Self, mpsc::Receiver<RelayTx>) {
        let (output, txs) = mpsc::channel(TX_CHANNEL_CAPACITY);
        let transmitter = Self {
            chain_id: config.chain_id,
            nonce: config.starting_nonce,
            fees: config.fee_policy(),
            signer,
            input,
            output,
        };
        (transmitter, txs)
    }

    /// Nonce the next transaction will use.
    pub fn next_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<Result<TaskExit, RelayError>> {
        tokio::spawn(async move {
            let result = self.run(shutdown).await;
            match &result {
                Ok(exit) => info!("[transmitter] Stopped: {}", exit),
                Err(e) => error!("[transmitter] Failed: {}", e),
            }
            result
        })
    }

    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<TaskExit, RelayError> {
        info!(
            "[transmitter] Starting (chain {}, sender 0x{}, nonce {})",
            self.chain_id,
            hex::encode(self.signer.sender()),
            self.nonce
        );
        loop {
            let certified = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                certified = self.input.recv() => certified,
            };
            let Some(certified) = certified else {
                return Ok(TaskExit::InputClosed);
            };

            let next_nonce = self
                .nonce
                .checked_add(1)
                .ok_or(RelayError::NonceExhausted { nonce: self.nonce })?;
            let relay_tx = self.build(&certified)?;
            self.nonce = next_nonce;
            info!(
                "[transmitter] Relay tx 0x{} for {} (nonce {}, tracking 0x{})",
                hex::encode(relay_tx.tx.hash()),
                certified.id(),
                relay_tx.tx.nonce(),
                hex::encode(relay_tx.tracking_id)
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                sent = self.output.send(relay_tx) => {
                    if sent.is_err() {
                        return Ok(TaskExit::OutputClosed);
                    }
                }
            }
        }
    }

    fn build(&self, certified: &CertifiedMessage) -> Result<RelayTx, RelayError> {
        let addressed = AddressedPayload::parse(certified.unsigned_message().payload()).map_err(
            |source| RelayError::PayloadParse {
                message_id: certified.id(),
                source,
            },
        )?;

        let tx = DynamicFeeTx::relay(self.chain_id, self.nonce, self.fees, certified.bytes());
        let signed = self.signer.sign(tx)?;

        Ok(RelayTx {
            tx: signed,
            tracking_id: addressed.tracking_id(),
        })
    }
}
