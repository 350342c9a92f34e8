//! # Domain Invariants
//!
//! Rules the aggregation state and the relay output must satisfy.

use super::attestation::AggregationRecord;
use super::certified::SignerBitSet;
use super::validators::ValidatorSet;

/// Invariant: a record finalizes once its weight reaches the threshold.
pub fn invariant_quorum_reached(weight: u64, threshold: u64) -> bool {
    weight >= threshold
}

/// Invariant: accumulated weight equals the summed weight of the signers.
pub fn invariant_weight_matches_signers(
    weight: u64,
    signers: &SignerBitSet,
    validators: &ValidatorSet,
) -> bool {
    let expected = signers
        .ordinals()
        .fold(0u64, |acc, ordinal| acc.saturating_add(validators.weight(ordinal)));
    weight == expected
}

/// Invariant: one collected signature per set bit.
pub fn invariant_record_consistent(record: &AggregationRecord, validators: &ValidatorSet) -> bool {
    record.signature_count() == record.signers().len()
        && invariant_weight_matches_signers(record.weight(), record.signers(), validators)
}

/// Invariant: nonces are consecutive starting at `start`.
pub fn invariant_gap_free_nonces(start: u64, nonces: &[u64]) -> bool {
    nonces
        .iter()
        .enumerate()
        .all(|(i, nonce)| start.checked_add(i as u64) == Some(*nonce))
}
