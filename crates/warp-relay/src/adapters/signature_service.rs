//! Local Warp Signature Service
//!
//! Implements `WarpSignatureClient` for a validator whose BLS key lives in
//! this process. Messages are looked up by id on the in-memory source chain
//! and signed over their canonical bytes.

use super::source_chain::InMemorySourceChain;
use crate::domain::{MessageId, NodeId, RelayError};
use crate::ports::outbound::WarpSignatureClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use warp_crypto::{BlsKeyPair, BlsPublicKey};

/// How the service answers signature requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureBehavior {
    /// Sign every known message.
    #[default]
    Honest,
    /// Return bytes that are not a BLS signature.
    Malformed,
    /// Fail every request.
    Unavailable,
}

/// Validator signing with a local BLS key.
pub struct LocalSignatureService {
    node_id: NodeId,
    key: BlsKeyPair,
    chain: Arc<InMemorySourceChain>,
    delay: Option<Duration>,
    behavior: SignatureBehavior,
}

impl LocalSignatureService {
    pub fn new(node_id: NodeId, key: BlsKeyPair, chain: Arc<InMemorySourceChain>) -> Self {
        Self {
            node_id,
            key,
            chain,
            delay: None,
            behavior: SignatureBehavior::Honest,
        }
    }

    /// Respond only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_behavior(mut self, behavior: SignatureBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn public_key(&self) -> BlsPublicKey {
        self.key.public_key()
    }
}

#[async_trait]
impl WarpSignatureClient for LocalSignatureService {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    async fn get_signature(&self, message_id: MessageId) -> Result<Vec<u8>, RelayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            SignatureBehavior::Honest => {}
            SignatureBehavior::Malformed => return Ok(vec![0xFF; 12]),
            SignatureBehavior::Unavailable => {
                return Err(RelayError::SignatureRequest {
                    node_id: self.node_id,
                    message_id,
                    reason: "validator unavailable".to_string(),
                })
            }
        }

        let message =
            self.chain
                .get_message(&message_id)
                .ok_or_else(|| RelayError::SignatureRequest {
                    node_id: self.node_id,
                    message_id,
                    reason: "unknown message".to_string(),
                })?;

        debug!(
            "[validator] {} signing warp message {}",
            self.node_id, message_id
        );
        Ok(self.key.sign(message.bytes()).to_bytes().to_vec())
    }
}
