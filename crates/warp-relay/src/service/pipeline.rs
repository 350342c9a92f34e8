//! # Relay Pipeline
//!
//! Wires the three stages together:
//!
//! ```text
//! AttestationSource (per validator) ──┐
//! AttestationSource (per validator) ──┼─▶ QuorumAggregator ─▶ Transmitter ─▶ RelayTx
//! AttestationSource (per validator) ──┘
//! ```
//!
//! Every stage owns the sender it writes to, so a stage that stops for any
//! reason closes its output and the next stage sees end-of-stream.

use super::aggregator::QuorumAggregator;
use super::shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
use super::source::AttestationSource;
use super::transmitter::CertifiedMessageTransmitter;
use crate::config::RelayConfig;
use crate::domain::{RelayError, RelayTx, TaskExit, ValidatorSet};
use crate::ports::outbound::{SourceChainClient, TransactionSigner, WarpSignatureClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Capacity of the aggregator → transmitter channel.
pub const CERTIFIED_CHANNEL_CAPACITY: usize = 1;

type TaskHandle = JoinHandle<Result<TaskExit, RelayError>>;

/// Pipeline under construction.
pub struct RelayPipeline {
    config: RelayConfig,
    validators: Arc<ValidatorSet>,
    source_chain: Arc<dyn SourceChainClient>,
    signature_clients: Vec<Arc<dyn WarpSignatureClient>>,
    signer: Arc<dyn TransactionSigner>,
}

impl RelayPipeline {
    pub fn new(
        config: RelayConfig,
        validators: Arc<ValidatorSet>,
        source_chain: Arc<dyn SourceChainClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            config,
            validators,
            source_chain,
            signature_clients: Vec::new(),
            signer,
        }
    }

    /// Add an attestation source for one validator.
    pub fn with_signature_client(mut self, client: Arc<dyn WarpSignatureClient>) -> Self {
        self.signature_clients.push(client);
        self
    }

    /// Start every stage.
    ///
    /// The configuration is checked against the validator set first. All sources are subscribed before this returns. If any subscription
    /// fails the stages already running are cancelled.
    pub async fn start(self) -> Result<PipelineHandle, RelayError> {
        self.config.validate_against(self.validators.total_weight())?;

        let (trigger, signal) = shutdown_channel();
        let (attestation_tx, attestation_rx) = mpsc::channel(self.config.channels.attestation_buffer);
        let (certified_tx, certified_rx) = mpsc::channel(CERTIFIED_CHANNEL_CAPACITY);

        let aggregator = QuorumAggregator::new(
            Arc::clone(&self.validators),
            &self.config.aggregator,
            attestation_rx,
            certified_tx,
        )
        .spawn(signal.clone());

        let (transmitter, txs) = CertifiedMessageTransmitter::new(
            &self.config.transmitter,
            Arc::clone(&self.signer),
            certified_rx,
        );
        let transmitter = transmitter.spawn(signal.clone());

        let mut sources = Vec::with_capacity(self.signature_clients.len());
        for client in self.signature_clients {
            let source = AttestationSource::new(
                Arc::clone(&self.source_chain),
                client,
                attestation_tx.clone(),
            );
            match source.start(signal.clone()).await {
                Ok(handle) => sources.push(handle),
                Err(e) => {
                    trigger.trigger();
                    return Err(e);
                }
            }
        }
        drop(attestation_tx);

        info!(
            "[pipeline] Started {} sources, threshold {}, expecting {} messages",
            sources.len(),
            self.config.aggregator.threshold,
            self.config.aggregator.expected_messages
        );

        Ok(PipelineHandle {
            txs: Some(txs),
            trigger,
            sources,
            aggregator,
            transmitter,
        })
    }
}

/// Running pipeline.
pub struct PipelineHandle {
    txs: Option<mpsc::Receiver<RelayTx>>,
    trigger: ShutdownTrigger,
    sources: Vec<TaskHandle>,
    aggregator: TaskHandle,
    transmitter: TaskHandle,
}

/// How each task ended.
#[derive(Debug)]
pub struct PipelineReport {
    pub sources: Vec<Result<TaskExit, RelayError>>,
    pub aggregator: Result<TaskExit, RelayError>,
    pub transmitter: Result<TaskExit, RelayError>,
}

impl PipelineReport {
    /// No task failed.
    pub fn is_clean(&self) -> bool {
        self.aggregator.is_ok() && self.transmitter.is_ok() && self.sources.iter().all(Result::is_ok)
    }
}

impl PipelineHandle {
    /// Next relay transaction; `None` once the transmitter has stopped.
    pub async fn next_tx(&mut self) -> Option<RelayTx> {
        self.txs.as_mut()?.recv().await
    }

    /// Take the transaction stream for an external consumer.
    pub fn take_txs(&mut self) -> Option<mpsc::Receiver<RelayTx>> {
        self.txs.take()
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        info!("[pipeline] Shutdown requested");
        self.trigger.trigger();
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.trigger.signal()
    }

    /// Cancel every task and collect how each ended.
    pub async fn stop(self) -> PipelineReport {
        self.shutdown();
        self.join().await
    }

    /// Wait for the aggregator and transmitter, then cancel the sources.
    ///
    /// Any transactions not yet received are dropped. The aggregator only
    /// finishes by itself once every expected message is certified or its
    /// input closes, so joining a run that is still short of that waits
    /// until [`shutdown`](Self::shutdown) fires; use [`stop`](Self::stop)
    /// to end such a run.
    pub async fn join(mut self) -> PipelineReport {
        drop(self.txs.take());
        let aggregator = flatten("aggregator", self.aggregator.await);
        let transmitter = flatten("transmitter", self.transmitter.await);

        // Sources only stop on their own when the chain closes.
        self.trigger.trigger();
        let mut sources = Vec::with_capacity(self.sources.len());
        for handle in self.sources {
            sources.push(flatten("source", handle.await));
        }

        PipelineReport {
            sources,
            aggregator,
            transmitter,
        }
    }
}

fn flatten(
    task: &'static str,
    joined: Result<Result<TaskExit, RelayError>, tokio::task::JoinError>,
) -> Result<TaskExit, RelayError> {
    joined.map_err(|e| RelayError::TaskAborted {
        task,
        reason: e.to_string(),
    })?
}
