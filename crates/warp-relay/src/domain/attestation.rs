//! # Attestations and Aggregation State
//!
//! A [`PartialAttestation`] is one validator's signature over one message.
//! The aggregator folds them into an [`AggregationRecord`] per message,
//! held in a [`RecordStore`] until the record reaches quorum.

use super::certified::{BitSetSignature, SignerBitSet};
use super::message::UnsignedMessage;
use super::value_objects::{MessageId, NodeId};
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::warn;
use warp_crypto::{BlsSignature, CryptoError};

/// One validator's signature over one unsigned message.
#[derive(Clone, Debug)]
pub struct PartialAttestation {
    pub message_id: MessageId,
    pub signer: NodeId,
    pub signature: BlsSignature,
    pub message: Arc<UnsignedMessage>,
}

impl PartialAttestation {
    pub fn new(signer: NodeId, signature: BlsSignature, message: Arc<UnsignedMessage>) -> Self {
        Self {
            message_id: message.id(),
            signer,
            signature,
            message,
        }
    }
}

/// Signatures collected so far for one message.
///
/// Weight always equals the summed weight of the ordinals in `signers`, and
/// `signatures` holds exactly one entry per set bit, in arrival order.
#[derive(Debug)]
pub struct AggregationRecord {
    message: Arc<UnsignedMessage>,
    weight: u64,
    signers: SignerBitSet,
    signatures: Vec<BlsSignature>,
}

impl AggregationRecord {
    pub fn new(message: Arc<UnsignedMessage>, validator_count: usize) -> Self {
        Self {
            message,
            weight: 0,
            signers: SignerBitSet::with_capacity(validator_count),
            signatures: Vec::new(),
        }
    }

    /// Fold a signature in. Returns `false` (and changes nothing) if the
    /// signer has already contributed.
    pub fn add_signature(&mut self, ordinal: usize, weight: u64, signature: BlsSignature) -> bool {
        if !self.signers.insert(ordinal) {
            return false;
        }
        self.signatures.push(signature);
        self.weight = self.weight.saturating_add(weight);
        true
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn signers(&self) -> &SignerBitSet {
        &self.signers
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn message(&self) -> &Arc<UnsignedMessage> {
        &self.message
    }

    /// Aggregate the collected signatures.
    pub fn aggregate(&self) -> Result<BitSetSignature, CryptoError> {
        let signature = BlsSignature::aggregate(&self.signatures)?;
        Ok(BitSetSignature {
            signers: self.signers.clone(),
            signature,
        })
    }
}

/// Pending records plus the set of retired message ids.
///
/// Pending records are bounded by an LRU; a message whose record is evicted
/// simply starts over if more signatures arrive. Finalized ids are kept
/// apart so eviction can never cause a second certificate.
pub struct RecordStore {
    pending: LruCache<MessageId, AggregationRecord>,
    finalized: HashSet<MessageId>,
}

impl RecordStore {
    /// `capacity == 0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        let pending = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            pending,
            finalized: HashSet::new(),
        }
    }

    pub fn is_finalized(&self, message_id: &MessageId) -> bool {
        self.finalized.contains(message_id)
    }

    /// Record for `message_id`, created on first use.
    pub fn record_mut(
        &mut self,
        message: &Arc<UnsignedMessage>,
        validator_count: usize,
    ) -> &mut AggregationRecord {
        let message_id = message.id();
        if !self.is_pending(&message_id) && self.pending.len() >= self.pending.cap().get() {
            if let Some((evicted, record)) = self.pending.pop_lru() {
                warn!(
                    "[aggregator] Evicting pending record {} with {} signatures; it cannot reach quorum now",
                    evicted,
                    record.signature_count()
                );
            }
        }
        self.pending.get_or_insert_mut(message_id, || {
            AggregationRecord::new(Arc::clone(message), validator_count)
        })
    }

    /// Whether a record for `message_id` is being collected.
    pub fn is_pending(&self, message_id: &MessageId) -> bool {
        self.pending.contains(message_id)
    }

    /// Retire `message_id`; later signatures for it are ignored.
    pub fn mark_finalized(&mut self, message_id: MessageId) {
        self.pending.pop(&message_id);
        self.finalized.insert(message_id);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn finalized_len(&self) -> usize {
        self.finalized.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::BlockchainId;
    use warp_crypto::BlsKeyPair;

    fn message(n: u8) -> Arc<UnsignedMessage> {
        Arc::new(UnsignedMessage::new(1, BlockchainId([1; 32]), vec![n]))
    }

    fn signature(seed: u8, message: &UnsignedMessage) -> BlsSignature {
        BlsKeyPair::from_seed(&[seed; 32])
            .unwrap()
            .sign(message.bytes())
    }

    #[test]
    fn test_record_accumulates_weight() {
        let msg = message(1);
        let mut record = AggregationRecord::new(msg.clone(), 4);

        assert!(record.add_signature(0, 1, signature(1, &msg)));
        assert!(record.add_signature(2, 5, signature(2, &msg)));

        assert_eq!(record.weight(), 6);
        assert_eq!(record.signature_count(), 2);
        assert_eq!(record.signers().ordinals().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_duplicate_signer_is_ignored() {
        let msg = message(1);
        let mut record = AggregationRecord::new(msg.clone(), 4);

        assert!(record.add_signature(1, 1, signature(1, &msg)));
        assert!(!record.add_signature(1, 1, signature(1, &msg)));

        assert_eq!(record.weight(), 1);
        assert_eq!(record.signature_count(), 1);
        assert_eq!(record.signers().len(), 1);
    }

    #[test]
    fn test_aggregate_empty_record_fails() {
        let record = AggregationRecord::new(message(1), 4);
        assert!(record.aggregate().is_err());
    }

    #[test]
    fn test_store_creates_record_once() {
        let mut store = RecordStore::new(0);
        let msg = message(1);

        store.record_mut(&msg, 3).add_signature(0, 1, signature(1, &msg));
        store.record_mut(&msg, 3).add_signature(1, 1, signature(2, &msg));

        assert_eq!(store.pending_len(), 1);
        assert_eq!(store.record_mut(&msg, 3).weight(), 2);
    }

    #[test]
    fn test_store_evicts_least_recently_used() {
        let mut store = RecordStore::new(2);
        let (a, b, c) = (message(1), message(2), message(3));

        store.record_mut(&a, 3);
        store.record_mut(&b, 3);
        store.record_mut(&a, 3);
        store.record_mut(&c, 3);

        assert_eq!(store.pending_len(), 2);
        assert!(!store.is_pending(&b.id()));
        assert!(store.is_pending(&a.id()));
    }

    #[test]
    fn test_finalized_survives_eviction() {
        let mut store = RecordStore::new(1);
        let (a, b) = (message(1), message(2));

        store.record_mut(&a, 3);
        store.mark_finalized(a.id());
        store.record_mut(&b, 3);

        assert!(store.is_finalized(&a.id()));
        assert!(!store.is_pending(&a.id()));
        assert!(!store.is_finalized(&b.id()));
        assert_eq!(store.finalized_len(), 1);
    }
}
