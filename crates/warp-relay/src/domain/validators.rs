//! Validator set
//!
//! Fixed mapping from validator identity to dense ordinal, public key and
//! voting weight. Ordinals follow the canonical ordering of the validators'
//! BLS public keys, so the relayer and the destination chain agree on what
//! each bit of a signer bitset means.

use super::value_objects::NodeId;
use std::collections::HashMap;
use warp_crypto::BlsPublicKey;

/// Default voting weight of a validator.
pub const DEFAULT_WEIGHT: u64 = 1;

/// A member of the validator set.
#[derive(Clone, Debug)]
pub struct Validator {
    pub node_id: NodeId,
    pub public_key: BlsPublicKey,
    pub weight: u64,
}

impl Validator {
    /// Validator with the default weight.
    pub fn new(node_id: NodeId, public_key: BlsPublicKey) -> Self {
        Self::with_weight(node_id, public_key, DEFAULT_WEIGHT)
    }

    pub fn with_weight(node_id: NodeId, public_key: BlsPublicKey, weight: u64) -> Self {
        Self {
            node_id,
            public_key,
            weight,
        }
    }
}

/// Immutable validator set.
#[derive(Clone, Debug, Default)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    index: HashMap<NodeId, usize>,
    total_weight: u64,
}

impl ValidatorSet {
    /// Build the set; ordinals are assigned by public key order.
    ///
    /// A node id listed twice keeps its first entry.
    pub fn new(mut validators: Vec<Validator>) -> Self {
        validators.sort_by(|a, b| a.public_key.cmp(&b.public_key));

        let mut index = HashMap::with_capacity(validators.len());
        let mut unique = Vec::with_capacity(validators.len());
        for validator in validators {
            if index.contains_key(&validator.node_id) {
                continue;
            }
            index.insert(validator.node_id, unique.len());
            unique.push(validator);
        }

        let total_weight = unique
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.weight));

        Self {
            validators: unique,
            index,
            total_weight,
        }
    }

    /// Ordinal of a validator, if it belongs to the set.
    pub fn ordinal(&self, node_id: &NodeId) -> Option<usize> {
        self.index.get(node_id).copied()
    }

    /// Voting weight of the validator at `ordinal` (0 when out of range).
    pub fn weight(&self, ordinal: usize) -> u64 {
        self.validators.get(ordinal).map_or(0, |v| v.weight)
    }

    pub fn get(&self, ordinal: usize) -> Option<&Validator> {
        self.validators.get(ordinal)
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }
}
