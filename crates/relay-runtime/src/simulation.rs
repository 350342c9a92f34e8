//! # Relay Simulation
//!
//! Stands up an in-process source chain with a validator set, submits
//! signed `sendWarpMessage` transactions carrying test payloads, runs the
//! relay pipeline over them and checks every relay transaction it emits:
//!
//! 1. the predicate decodes to a certified message
//! 2. the certificate verifies against the validator set at the threshold
//! 3. the tracking id matches a message that was sent, exactly once

use crate::config::RuntimeConfig;
use anyhow::{bail, ensure, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warp_crypto::{keccak256, BlsKeyPair, Secp256k1KeyPair};
use warp_relay::domain::{FeePolicy, Hash, SignedTransaction};
use warp_relay::{
    AddressedPayload, BlockchainId, CertifiedMessage, DynamicFeeTx, InMemorySourceChain,
    LocalSignatureService, LocalTxSigner, NodeId, PipelineReport, RelayPipeline, RelayTx,
    SendWarpMessageInput, ShutdownSignal, TestPayload, Validator, ValidatorSet,
    DEFAULT_LOG_BUFFER, WARP_PRECOMPILE_ADDRESS,
};

/// Source chain blockchain id used by the simulation.
pub const SOURCE_BLOCKCHAIN_ID: BlockchainId = BlockchainId([0x51; 32]);

/// Destination blockchain id stamped into every test payload.
pub const DESTINATION_BLOCKCHAIN_ID: BlockchainId = BlockchainId([0xD5; 32]);

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct SimulationReport {
    /// Messages submitted to the source chain.
    pub sent: usize,
    /// Relay transactions received and verified.
    pub relayed: usize,
    /// Nonces of the relay transactions, in emission order.
    pub nonces: Vec<u64>,
    /// Whether the run was interrupted by the stop signal.
    pub interrupted: bool,
    /// How each pipeline task ended.
    pub pipeline: PipelineReport,
}

impl SimulationReport {
    /// Every sent message was relayed and no task failed.
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.relayed == self.sent && self.pipeline.is_clean()
    }
}

/// In-process network plus the relay pipeline configuration.
pub struct SimulationHarness {
    config: RuntimeConfig,
    chain: Arc<InMemorySourceChain>,
    validators: Arc<ValidatorSet>,
    services: Vec<Arc<LocalSignatureService>>,
    relayer: Arc<LocalTxSigner>,
    sender: Secp256k1KeyPair,
}

impl SimulationHarness {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        // Every message is announced before the sources drain the bus, so
        // the bus must hold them all.
        let log_buffer = config
            .relay
            .aggregator
            .expected_messages
            .max(DEFAULT_LOG_BUFFER);
        let chain = Arc::new(InMemorySourceChain::with_log_buffer(
            config.simulation.network_id,
            SOURCE_BLOCKCHAIN_ID,
            config.simulation.source_chain_id,
            log_buffer,
        ));

        let mut members = Vec::with_capacity(config.simulation.validators);
        let mut services = Vec::with_capacity(config.simulation.validators);
        for index in 0..config.simulation.validators {
            let key = BlsKeyPair::generate();
            let node_id = node_id_for(index);
            members.push(Validator::new(node_id, key.public_key()));
            services.push(Arc::new(LocalSignatureService::new(
                node_id,
                key,
                Arc::clone(&chain),
            )));
        }

        let relayer_key = match &config.simulation.relayer_key {
            Some(encoded) => Secp256k1KeyPair::from_hex(encoded).context("Invalid relayer key")?,
            None => Secp256k1KeyPair::generate(),
        };

        info!(
            "[simulation] {} validators, threshold {}, relayer 0x{}",
            members.len(),
            config.relay.aggregator.threshold,
            hex::encode(relayer_key.address())
        );

        Ok(Self {
            config,
            chain,
            validators: Arc::new(ValidatorSet::new(members)),
            services,
            relayer: Arc::new(LocalTxSigner::new(relayer_key)),
            sender: Secp256k1KeyPair::generate(),
        })
    }

    pub fn validators(&self) -> &Arc<ValidatorSet> {
        &self.validators
    }

    pub fn chain(&self) -> &Arc<InMemorySourceChain> {
        &self.chain
    }

    /// Run until every expected message is relayed or `stop` fires.
    pub async fn run(self, mut stop: ShutdownSignal) -> Result<SimulationReport> {
        let pipeline = self.services.iter().fold(
            RelayPipeline::new(
                self.config.relay.clone(),
                Arc::clone(&self.validators),
                self.chain.clone(),
                self.relayer.clone(),
            ),
            |pipeline, service| pipeline.with_signature_client(service.clone()),
        );
        let mut handle = pipeline.start().await.context("Failed to start relay pipeline")?;

        let expected = self.config.relay.aggregator.expected_messages;
        let mut outstanding = self.send_messages(expected)?;
        info!("[simulation] Submitted {} warp messages", expected);

        let threshold = self.config.relay.aggregator.threshold;
        let wait = Duration::from_secs(self.config.simulation.tx_timeout_secs);
        let mut nonces = Vec::with_capacity(expected);
        let mut interrupted = false;

        while !outstanding.is_empty() {
            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    warn!(
                        "[simulation] Interrupted with {} messages outstanding",
                        outstanding.len()
                    );
                    handle.shutdown();
                    interrupted = true;
                    break;
                }
                next = tokio::time::timeout(wait, handle.next_tx()) => next,
            };
            let relay = match next {
                Ok(Some(relay)) => relay,
                Ok(None) => {
                    warn!(
                        "[simulation] Pipeline closed with {} messages outstanding",
                        outstanding.len()
                    );
                    break;
                }
                Err(_) => {
                    handle.shutdown();
                    bail!("No relay transaction within {:?}", wait);
                }
            };

            let payload = self.check(&relay, threshold)?;
            ensure!(
                outstanding.remove(&relay.tracking_id) == Some(payload),
                "Relay tracking id 0x{} was not sent or was relayed twice",
                hex::encode(relay.tracking_id)
            );
            nonces.push(relay.tx.nonce());
        }

        let relayed = nonces.len();
        let pipeline = handle.join().await;
        info!(
            "[simulation] Relayed {}/{} messages (aggregator: {:?}, transmitter: {:?})",
            relayed, expected, pipeline.aggregator, pipeline.transmitter
        );

        Ok(SimulationReport {
            sent: expected,
            relayed,
            nonces,
            interrupted,
            pipeline,
        })
    }

    /// Submit `count` signed `sendWarpMessage` transactions.
    ///
    /// Returns the tracking id of each message mapped to its test payload.
    fn send_messages(&self, count: usize) -> Result<HashMap<Hash, TestPayload>> {
        let chain_id = self.chain.evm_chain_id();
        let mut sent = HashMap::with_capacity(count);
        for _ in 0..count {
            let nonce = self.chain.nonce_of(&self.sender.address());
            let payload = TestPayload::new(DESTINATION_BLOCKCHAIN_ID, self.sender.address(), nonce);
            let input = SendWarpMessageInput {
                destination_chain_id: DESTINATION_BLOCKCHAIN_ID,
                destination_address: self.sender.address(),
                payload: payload.encode(),
            };

            let tx = DynamicFeeTx::send_warp_message(chain_id, nonce, FeePolicy::default(), &input);
            let signature = self
                .sender
                .sign_prehash(&tx.signing_hash())
                .context("Failed to sign sendWarpMessage transaction")?;
            let signed = SignedTransaction::new(tx, signature);
            self.chain
                .submit_transaction(signed.encode())
                .with_context(|| format!("Source chain rejected transaction {}", nonce))?;

            sent.insert(keccak256(&input.payload), payload);
        }
        Ok(sent)
    }

    /// Decode and verify a relay transaction, returning its test payload.
    fn check(&self, relay: &RelayTx, threshold: u64) -> Result<TestPayload> {
        let predicate = relay
            .tx
            .tx()
            .predicate(&WARP_PRECOMPILE_ADDRESS)
            .context("Relay transaction carries no warp predicate")?;
        let certified =
            CertifiedMessage::parse(&predicate).context("Malformed certified message")?;
        certified
            .verify(&self.validators, threshold)
            .with_context(|| format!("Certificate for {} does not verify", certified.id()))?;

        let addressed = AddressedPayload::parse(certified.unsigned_message().payload())
            .context("Certified payload is not addressed")?;
        let payload = TestPayload::decode(&addressed.payload)
            .context("Certified payload is not a test payload")?;
        ensure!(
            addressed.tracking_id() == relay.tracking_id,
            "Tracking id mismatch for {}",
            certified.id()
        );
        ensure!(
            payload.destination_chain_id == DESTINATION_BLOCKCHAIN_ID,
            "Unexpected destination {}",
            payload.destination_chain_id
        );
        Ok(payload)
    }
}

fn node_id_for(index: usize) -> NodeId {
    let digest = keccak256(&(index as u64).to_be_bytes());
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[12..]);
    NodeId(id)
}
