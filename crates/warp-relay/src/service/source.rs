//! # Attestation Source
//!
//! One per validator. Watches the source chain for warp announcements,
//! asks the validator for its signature over each and forwards the result
//! to the shared attestation channel.

use super::shutdown::ShutdownSignal;
use crate::domain::{PartialAttestation, RelayError, TaskExit, UnsignedMessage};
use crate::ports::outbound::{LogFilter, LogSubscription, SourceChainClient, WarpSignatureClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use warp_crypto::BlsSignature;

pub struct AttestationSource {
    chain: Arc<dyn SourceChainClient>,
    client: Arc<dyn WarpSignatureClient>,
    output: mpsc::Sender<PartialAttestation>,
}

impl AttestationSource {
    pub fn new(
        chain: Arc<dyn SourceChainClient>,
        client: Arc<dyn WarpSignatureClient>,
        output: mpsc::Sender<PartialAttestation>,
    ) -> Self {
        Self {
            chain,
            client,
            output,
        }
    }

    /// Subscribe, then spawn the loop.
    ///
    /// The subscription exists once this returns, so nothing announced
    /// afterwards is missed.
    pub async fn start(
        self,
        shutdown: ShutdownSignal,
    ) -> Result<JoinHandle<Result<TaskExit, RelayError>>, RelayError> {
        let subscription = self.chain.subscribe_logs(LogFilter::warp_messages()).await?;
        let node_id = self.client.node_id();
        info!("[source] Starting warp relay client for {}", node_id);

        Ok(tokio::spawn(async move {
            let result = self.run(subscription, shutdown).await;
            match &result {
                Ok(exit) => info!("[source] {} stopped: {}", node_id, exit),
                Err(e) => error!("[source] {} failed: {}", node_id, e),
            }
            result
        }))
    }

    async fn run(
        self,
        mut subscription: Box<dyn LogSubscription>,
        mut shutdown: ShutdownSignal,
    ) -> Result<TaskExit, RelayError> {
        let result = self.process(subscription.as_mut(), &mut shutdown).await;
        subscription.unsubscribe();
        result
    }

    async fn process(
        &self,
        subscription: &mut dyn LogSubscription,
        shutdown: &mut ShutdownSignal,
    ) -> Result<TaskExit, RelayError> {
        let node_id = self.client.node_id();
        loop {
            let log = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                log = subscription.next_log() => log?,
            };
            let Some(log) = log else {
                info!("[source] Log stream for {} closed", node_id);
                return Ok(TaskExit::InputClosed);
            };

            let message = Arc::new(UnsignedMessage::parse(&log.data).map_err(RelayError::Parse)?);
            let message_id = message.id();
            debug!(
                "[source] {} parsed warp message {} (block {})",
                node_id, message_id, log.block_number
            );

            let raw = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                raw = self.client.get_signature(message_id) => raw?,
            };
            let signature = BlsSignature::from_slice(&raw)
                .map_err(|source| RelayError::SignatureParse { node_id, source })?;

            let attestation = PartialAttestation::new(node_id, signature, message);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(TaskExit::Cancelled),
                sent = self.output.send(attestation) => {
                    if sent.is_err() {
                        return Ok(TaskExit::OutputClosed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemorySourceChain, LocalSignatureService, SignatureBehavior};
    use crate::domain::{BlockchainId, NodeId, SendWarpMessageInput};
    use crate::ports::Log;
    use crate::service::shutdown::shutdown_channel;
    use std::time::Duration;
    use warp_crypto::BlsKeyPair;

    fn input(n: u8) -> SendWarpMessageInput {
        SendWarpMessageInput {
            destination_chain_id: BlockchainId([2; 32]),
            destination_address: [3; 20],
            payload: vec![n],
        }
    }

    fn make_source(
        chain: &Arc<InMemorySourceChain>,
        behavior: SignatureBehavior,
    ) -> (AttestationSource, mpsc::Receiver<PartialAttestation>, BlsKeyPair) {
        let key = BlsKeyPair::from_seed(&[1; 32]).unwrap();
        let service = LocalSignatureService::new(
            NodeId([1; 20]),
            BlsKeyPair::from_seed(&[1; 32]).unwrap(),
            chain.clone(),
        )
        .with_behavior(behavior);
        let (tx, rx) = mpsc::channel(8);
        (
            AttestationSource::new(chain.clone(), Arc::new(service), tx),
            rx,
            key,
        )
    }

    fn chain() -> Arc<InMemorySourceChain> {
        Arc::new(InMemorySourceChain::new(1, BlockchainId([1; 32]), 1))
    }

    #[tokio::test]
    async fn test_emits_attestation_per_announcement() {
        let chain = chain();
        let (source, mut rx, key) = make_source(&chain, SignatureBehavior::Honest);
        let (trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        let a = chain.send_warp_message([9; 20], input(1)).unwrap();
        let b = chain.send_warp_message([9; 20], input(2)).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.message_id, a.id());
        assert_eq!(second.message_id, b.id());
        assert_eq!(first.signer, NodeId([1; 20]));
        assert!(key.public_key().verify(a.bytes(), &first.signature));

        trigger.trigger();
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::Cancelled);
    }

    #[tokio::test]
    async fn test_stream_end_is_clean_exit() {
        let chain = chain();
        let (source, _rx, _) = make_source(&chain, SignatureBehavior::Honest);
        let (_trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.close();
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::InputClosed);
    }

    #[tokio::test]
    async fn test_unparseable_log_is_fatal() {
        let chain = chain();
        let (source, mut rx, _) = make_source(&chain, SignatureBehavior::Honest);
        let (_trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.publish_raw_log(Log {
            address: crate::domain::WARP_PRECOMPILE_ADDRESS,
            topics: vec![],
            data: vec![0xde, 0xad],
            block_number: 1,
            tx_hash: [0; 32],
        });

        assert!(matches!(handle.await.unwrap(), Err(RelayError::Parse(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_signature_is_fatal() {
        let chain = chain();
        let (source, _rx, _) = make_source(&chain, SignatureBehavior::Malformed);
        let (_trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.send_warp_message([9; 20], input(1)).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(RelayError::SignatureParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_signature_request_is_fatal() {
        let chain = chain();
        let (source, _rx, _) = make_source(&chain, SignatureBehavior::Unavailable);
        let (_trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.send_warp_message([9; 20], input(1)).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(RelayError::SignatureRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_signature_request() {
        let chain = chain();
        let service = LocalSignatureService::new(
            NodeId([1; 20]),
            BlsKeyPair::from_seed(&[1; 32]).unwrap(),
            chain.clone(),
        )
        .with_delay(Duration::from_secs(3600));
        let (tx, mut rx) = mpsc::channel(1);
        let source = AttestationSource::new(chain.clone(), Arc::new(service), tx);
        let (trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.send_warp_message([9; 20], input(1)).unwrap();
        tokio::task::yield_now().await;
        trigger.trigger();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, TaskExit::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_aggregator_ends_source() {
        let chain = chain();
        let (source, rx, _) = make_source(&chain, SignatureBehavior::Honest);
        drop(rx);
        let (_trigger, signal) = shutdown_channel();
        let handle = source.start(signal).await.unwrap();

        chain.send_warp_message([9; 20], input(1)).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), TaskExit::OutputClosed);
    }

    #[tokio::test]
    async fn test_lost_announcements_are_fatal() {
        let chain = Arc::new(InMemorySourceChain::with_log_buffer(
            1,
            BlockchainId([1; 32]),
            1,
            2,
        ));
        let (source, mut rx, _) = make_source(&chain, SignatureBehavior::Honest);
        let (_trigger, signal) = shutdown_channel();
        // Announce before the spawned loop gets to run, so it starts behind.
        let subscription = chain.subscribe_logs(LogFilter::warp_messages()).await.unwrap();
        for n in 0..6 {
            chain.send_warp_message([9; 20], input(n)).unwrap();
        }
        let result = source.run(subscription, signal).await;

        assert!(matches!(result, Err(RelayError::Subscription(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_failure_reported_by_start() {
        let chain = chain();
        chain.close();
        let (source, _rx, _) = make_source(&chain, SignatureBehavior::Honest);
        let (_trigger, signal) = shutdown_channel();
        assert!(matches!(
            source.start(signal).await,
            Err(RelayError::Subscription(_))
        ));
    }
}
