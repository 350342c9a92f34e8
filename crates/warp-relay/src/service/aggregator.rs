//! # Quorum Aggregator
//!
//! Folds partial attestations into per-message records. When a record's
//! weight reaches the threshold the collected signatures are aggregated,
//! the certified message is emitted and the message id is retired. Stops
//! after the configured number of certified messages.
//!
//! ## Ordering
//!
//! 1. Unknown signer: fatal, before any record is touched
//! 2. Retired message: ignored
//! 3. Signer already counted: ignored
//! 4. Otherwise set the bit, keep the signature, add the weight

use super::shutdown::ShutdownSignal;
use crate::config::AggregatorConfig;
use crate::domain::{
    invariant_quorum_reached, invariant_record_consistent, CertifiedMessage, PartialAttestation,
    RecordStore, RelayError, TaskExit, ValidatorSet,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

pub struct QuorumAggregator {
    validators: Arc<ValidatorSet>,
    threshold: u64,
    remaining: usize,
    records: RecordStore,
    input: mpsc::Receiver<PartialAttestation>,
    output: mpsc::Sender<CertifiedMessage>,
}

impl QuorumAggregator {
    pub fn new(
        validators: Arc<ValidatorSet>,
        config: &AggregatorConfig,
        input: mpsc::Receiver<PartialAttestation>,
        output: mpsc::Sender<CertifiedMessage>,
    ) -> Self {
        Self {
            validators,
            threshold: config.threshold,
            remaining: config.expected_messages,
            records: RecordStore::new(config.max_pending_records),
            input,
            output,
        }
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<Result<TaskExit, RelayError>> {
        tokio::spawn(async move {
            let result = self.run(shutdown).await;
            match &result {
                Ok(exit) => info!("[aggregator] Stopped: {}", exit),
                Err(e) => error!("[aggregator] Failed: {}", e),
            }
            result
        })
    }

    /// Run until every expected message is certified, the input closes,
    /// or shutdown fires. The output channel closes when this returns.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<TaskExit, RelayError> {
        info!(
            "[aggregator] Starting (threshold {}, expecting {} messages, {} validators)",
            self.threshold,
            self.remaining,
            self.validators.len()
        );
        if self.remaining == 0 {
            return Ok(TaskExit::Completed);
        }

        loop {
            let attestation = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                attestation = self.input.recv() => attestation,
            };
            let Some(attestation) = attestation else {
                return Ok(TaskExit::InputClosed);
            };

            if let Some(exit) = self.fold(attestation, &mut shutdown).await? {
                return Ok(exit);
            }
        }
    }

    async fn fold(
        &mut self,
        attestation: PartialAttestation,
        shutdown: &mut ShutdownSignal,
    ) -> Result<Option<TaskExit>, RelayError> {
        let PartialAttestation {
            message_id,
            signer,
            signature,
            message,
        } = attestation;

        let ordinal = self
            .validators
            .ordinal(&signer)
            .ok_or(RelayError::UnknownValidator { node_id: signer })?;

        if self.records.is_finalized(&message_id) {
            trace!(
                "[aggregator] Ignoring signature from {} for certified message {}",
                signer,
                message_id
            );
            return Ok(None);
        }

        let weight = self.validators.weight(ordinal);
        let record = self.records.record_mut(&message, self.validators.len());
        if !record.add_signature(ordinal, weight, signature) {
            debug!(
                "[aggregator] Duplicate signature from {} for {}",
                signer, message_id
            );
            return Ok(None);
        }
        debug_assert!(invariant_record_consistent(record, &self.validators));
        debug!(
            "[aggregator] Received warp signature for {} from {} (ordinal {}, weight {}/{})",
            message_id,
            signer,
            ordinal,
            record.weight(),
            self.threshold
        );

        if !invariant_quorum_reached(record.weight(), self.threshold) {
            return Ok(None);
        }

        let signature = record
            .aggregate()
            .map_err(|source| RelayError::Aggregation { message_id, source })?;
        let signer_count = signature.signers.len();
        let certified = CertifiedMessage::new(Arc::clone(record.message()), signature)
            .map_err(|source| RelayError::MessageConstruction { message_id, source })?;

        info!(
            "[aggregator] Signatures aggregated for {} ({} signers, {} messages remaining)",
            message_id,
            signer_count,
            self.remaining - 1
        );

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Some(TaskExit::Cancelled)),
            sent = self.output.send(certified) => {
                if sent.is_err() {
                    return Ok(Some(TaskExit::OutputClosed));
                }
            }
        }

        self.records.mark_finalized(message_id);
        self.remaining -= 1;
        if self.remaining == 0 {
            return Ok(Some(TaskExit::Completed));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockchainId, NodeId, UnsignedMessage, Validator};
    use crate::service::shutdown::shutdown_channel;
    use warp_crypto::BlsKeyPair;

    struct Fixture {
        keys: Vec<BlsKeyPair>,
        validators: Arc<ValidatorSet>,
    }

    impl Fixture {
        fn new(count: u8) -> Self {
            let keys: Vec<BlsKeyPair> = (1..=count)
                .map(|n| BlsKeyPair::from_seed(&[n; 32]).unwrap())
                .collect();
            let validators = Arc::new(ValidatorSet::new(
                keys.iter()
                    .enumerate()
                    .map(|(i, k)| Validator::new(node(i), k.public_key()))
                    .collect(),
            ));
            Self { keys, validators }
        }

        fn attest(&self, i: usize, message: &Arc<UnsignedMessage>) -> PartialAttestation {
            PartialAttestation::new(node(i), self.keys[i].sign(message.bytes()), message.clone())
        }

        fn aggregator(
            &self,
            threshold: u64,
            expected: usize,
        ) -> (
            QuorumAggregator,
            mpsc::Sender<PartialAttestation>,
            mpsc::Receiver<CertifiedMessage>,
        ) {
            let (in_tx, in_rx) = mpsc::channel(32);
            let (out_tx, out_rx) = mpsc::channel(1);
            let config = AggregatorConfig {
                threshold,
                expected_messages: expected,
                max_pending_records: 0,
            };
            (
                QuorumAggregator::new(self.validators.clone(), &config, in_rx, out_tx),
                in_tx,
                out_rx,
            )
        }
    }

    fn node(i: usize) -> NodeId {
        NodeId([i as u8 + 1; 20])
    }

    fn message(n: u8) -> Arc<UnsignedMessage> {
        Arc::new(UnsignedMessage::new(1, BlockchainId([0; 32]), vec![n]))
    }

    #[tokio::test]
    async fn test_threshold_three_of_four() {
        let fx = Fixture::new(4);
        let (agg, tx, mut rx) = fx.aggregator(3, 1);
        let (_trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let msg = message(1);
        for i in 0..3 {
            tx.send(fx.attest(i, &msg)).await.unwrap();
        }

        let cert = rx.recv().await.unwrap();
        assert_eq!(cert.id(), msg.id());
        let expected: Vec<usize> = (0..3)
            .map(|i| fx.validators.ordinal(&node(i)).unwrap())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(cert.signers().ordinals().collect::<Vec<_>>(), expected);
        assert!(cert.verify(&fx.validators, 3).is_ok());

        assert!(rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Completed);
    }

    #[tokio::test]
    async fn test_below_threshold_emits_nothing() {
        let fx = Fixture::new(4);
        let (agg, tx, mut rx) = fx.aggregator(3, 1);
        let (_trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let msg = message(1);
        tx.send(fx.attest(0, &msg)).await.unwrap();
        tx.send(fx.attest(1, &msg)).await.unwrap();
        drop(tx);

        assert!(rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::InputClosed);
    }

    #[tokio::test]
    async fn test_duplicate_signer_does_not_reach_quorum() {
        let fx = Fixture::new(4);
        let (agg, tx, mut rx) = fx.aggregator(2, 1);
        let (_trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let msg = message(1);
        tx.send(fx.attest(0, &msg)).await.unwrap();
        tx.send(fx.attest(0, &msg)).await.unwrap();
        tx.send(fx.attest(0, &msg)).await.unwrap();
        drop(tx);

        assert!(rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::InputClosed);
    }

    #[tokio::test]
    async fn test_signature_after_finalization_is_ignored() {
        let fx = Fixture::new(4);
        let (agg, tx, mut rx) = fx.aggregator(2, 2);
        let (_trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let first = message(1);
        let second = message(2);
        tx.send(fx.attest(0, &first)).await.unwrap();
        tx.send(fx.attest(1, &first)).await.unwrap();
        let cert = rx.recv().await.unwrap();
        assert_eq!(cert.signers().len(), 2);

        // Late signatures for the certified message must not produce a second certificate.
        tx.send(fx.attest(2, &first)).await.unwrap();
        tx.send(fx.attest(3, &first)).await.unwrap();
        tx.send(fx.attest(2, &second)).await.unwrap();
        tx.send(fx.attest(3, &second)).await.unwrap();

        let next = rx.recv().await.unwrap();
        assert_eq!(next.id(), second.id());
        assert!(rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Completed);
    }

    #[tokio::test]
    async fn test_unknown_validator_is_fatal() {
        let fx = Fixture::new(3);
        let (agg, tx, mut rx) = fx.aggregator(2, 1);
        let (_trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let msg = message(1);
        let outsider = BlsKeyPair::from_seed(&[99; 32]).unwrap();
        tx.send(PartialAttestation::new(
            NodeId([0xEE; 20]),
            outsider.sign(msg.bytes()),
            msg.clone(),
        ))
        .await
        .unwrap();

        assert!(rx.recv().await.is_none());
        assert!(matches!(
            handle.await.unwrap(),
            Err(RelayError::UnknownValidator { node_id }) if node_id == NodeId([0xEE; 20])
        ));
    }

    #[tokio::test]
    async fn test_zero_expected_completes_immediately() {
        let fx = Fixture::new(2);
        let (agg, _tx, mut rx) = fx.aggregator(1, 0);
        let (_trigger, signal) = shutdown_channel();

        assert_eq!(agg.run(signal).await.unwrap(), TaskExit::Completed);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_threshold() {
        let fx = Fixture::new(4);
        let (agg, tx, mut rx) = fx.aggregator(3, 1);
        let (trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        let msg = message(1);
        tx.send(fx.attest(0, &msg)).await.unwrap();
        trigger.trigger();

        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_emit() {
        let fx = Fixture::new(2);
        let (agg, tx, rx) = fx.aggregator(1, 3);
        let (trigger, signal) = shutdown_channel();
        let handle = agg.spawn(signal);

        // Fill the single output slot, then block on the second emission.
        tx.send(fx.attest(0, &message(1))).await.unwrap();
        tx.send(fx.attest(0, &message(2))).await.unwrap();
        tokio::task::yield_now().await;
        trigger.trigger();

        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Cancelled);
        drop(rx);
    }

    #[tokio::test]
    async fn test_weighted_quorum() {
        let keys: Vec<BlsKeyPair> = (1..=3u8)
            .map(|n| BlsKeyPair::from_seed(&[n; 32]).unwrap())
            .collect();
        let validators = Arc::new(ValidatorSet::new(vec![
            Validator::with_weight(node(0), keys[0].public_key(), 5),
            Validator::with_weight(node(1), keys[1].public_key(), 1),
            Validator::with_weight(node(2), keys[2].public_key(), 1),
        ]));
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let config = AggregatorConfig {
            threshold: 5,
            expected_messages: 1,
            max_pending_records: 0,
        };
        let (_trigger, signal) = shutdown_channel();
        let handle =
            QuorumAggregator::new(validators.clone(), &config, in_rx, out_tx).spawn(signal);

        let msg = message(1);
        in_tx
            .send(PartialAttestation::new(node(0), keys[0].sign(msg.bytes()), msg.clone()))
            .await
            .unwrap();

        let cert = out_rx.recv().await.unwrap();
        assert_eq!(cert.signers().len(), 1);
        assert!(cert.verify(&validators, 5).is_ok());
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Completed);
    }
}
