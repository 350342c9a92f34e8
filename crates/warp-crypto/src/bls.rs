//! # Validator Attestation Signatures (BLS12-381, min_pk)
//!
//! Validators sign the raw bytes of an unsigned warp message. Public keys sit
//! on G1 (48 bytes compressed), signatures on G2 (96 bytes compressed), which
//! is the layout a certified message carries on the wire.
//!
//! Combining signatures is point addition on G2, so an aggregate does not
//! depend on the order the attestations arrived in.

use std::cmp::Ordering;
use std::fmt;

use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;

use crate::CryptoError;

/// Proof-of-possession ciphersuite tag.
const POP_CIPHERSUITE: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key length.
pub const PUBLIC_KEY_LEN: usize = 48;

/// Compressed signature length.
pub const SIGNATURE_LEN: usize = 96;

const MIN_IKM_LEN: usize = 32;

/// Validator public key. Compares and orders by its compressed encoding,
/// which is what canonical validator ordering is built on.
#[derive(Clone)]
pub struct BlsPublicKey(PublicKey);

/// Attestation signature, either from one validator or an aggregate.
#[derive(Clone)]
pub struct BlsSignature(Signature);

/// Signing key held by a validator.
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKey,
}

impl BlsKeyPair {
    /// Fresh key from 32 bytes of OS randomness.
    pub fn generate() -> Self {
        let mut ikm = [0u8; MIN_IKM_LEN];
        rand::thread_rng().fill_bytes(&mut ikm);
        // key_gen only refuses material shorter than 32 bytes
        Self::from_seed(&ikm).expect("32 bytes of key material")
    }

    /// Deterministic key from `ikm`, which must be at least 32 bytes.
    pub fn from_seed(ikm: &[u8]) -> Result<Self, CryptoError> {
        if ikm.len() < MIN_IKM_LEN {
            return Err(CryptoError::InvalidLength {
                expected: MIN_IKM_LEN,
                actual: ikm.len(),
            });
        }
        let secret = SecretKey::key_gen(ikm, &[]).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let public = BlsPublicKey(secret.sk_to_pk());
        Ok(Self { secret, public })
    }

    /// Attest to `message`.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.secret.sign(message, POP_CIPHERSUITE, &[]))
    }

    /// Key registered in the validator set.
    pub fn public_key(&self) -> BlsPublicKey {
        self.public.clone()
    }
}

impl BlsPublicKey {
    /// Check a single validator's signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &BlsSignature) -> bool {
        let outcome = signature
            .0
            .verify(true, message, POP_CIPHERSUITE, &[], &self.0, true);
        outcome == BLST_ERROR::BLST_SUCCESS
    }

    /// Decode a compressed G1 point, rejecting anything off the curve.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, CryptoError> {
        match PublicKey::key_validate(bytes) {
            Ok(point) => Ok(Self(point)),
            Err(_) => Err(CryptoError::InvalidPublicKey),
        }
    }

    /// Compressed G1 encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Sum of `keys`. Verifies an aggregate signature over a common message.
    pub fn aggregate<'a, I>(keys: I) -> Result<Self, CryptoError>
    where
        I: IntoIterator<Item = &'a BlsPublicKey>,
    {
        let points: Vec<&PublicKey> = keys.into_iter().map(|key| &key.0).collect();
        if points.is_empty() {
            return Err(CryptoError::EmptyAggregation("public key"));
        }
        let sum = AggregatePublicKey::aggregate(&points, true)
            .map_err(|_| CryptoError::AggregationFailed)?;
        Ok(Self(sum.to_public_key()))
    }
}

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BlsPublicKey {}

impl PartialOrd for BlsPublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlsPublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlsPublicKey({})", hex::encode(&self.to_bytes()[..8]))
    }
}

impl BlsSignature {
    /// Decode a compressed G2 point.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LEN]) -> Result<Self, CryptoError> {
        match Signature::from_bytes(bytes) {
            Ok(point) => Ok(Self(point)),
            Err(_) => Err(CryptoError::InvalidSignature),
        }
    }

    /// Like [`from_bytes`](Self::from_bytes) for an unsized buffer; the
    /// length is checked before any curve work.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let fixed = <&[u8; SIGNATURE_LEN]>::try_from(bytes).map_err(|_| {
            CryptoError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            }
        })?;
        Self::from_bytes(fixed)
    }

    /// Compressed G2 encoding.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    /// Combine attestations over the same message.
    pub fn aggregate<'a, I>(signatures: I) -> Result<Self, CryptoError>
    where
        I: IntoIterator<Item = &'a BlsSignature>,
    {
        let points: Vec<&Signature> = signatures.into_iter().map(|sig| &sig.0).collect();
        if points.is_empty() {
            return Err(CryptoError::EmptyAggregation("signature"));
        }
        let sum = AggregateSignature::aggregate(&points, true)
            .map_err(|_| CryptoError::AggregationFailed)?;
        Ok(Self(sum.to_signature()))
    }

    /// True when `signers` together produced this aggregate over `message`.
    /// An empty signer list never verifies.
    pub fn fast_aggregate_verify<'a, I>(&self, message: &[u8], signers: I) -> bool
    where
        I: IntoIterator<Item = &'a BlsPublicKey>,
    {
        let points: Vec<&PublicKey> = signers.into_iter().map(|key| &key.0).collect();
        if points.is_empty() {
            return false;
        }
        let outcome = self
            .0
            .fast_aggregate_verify(true, message, POP_CIPHERSUITE, &points);
        outcome == BLST_ERROR::BLST_SUCCESS
    }
}

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlsSignature({})", hex::encode(&self.to_bytes()[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSIGNED: &[u8] = b"\x00\x00\x00\x00\x05\x39warp-unsigned-message";

    fn validators(n: u8) -> Vec<BlsKeyPair> {
        (1..=n)
            .map(|seed| BlsKeyPair::from_seed(&[seed; 32]).unwrap())
            .collect()
    }

    #[test]
    fn test_attestation_verifies_only_for_signer_and_message() {
        let keys = validators(2);
        let attestation = keys[0].sign(UNSIGNED);

        assert!(keys[0].public_key().verify(UNSIGNED, &attestation));
        assert!(!keys[0].public_key().verify(b"other message", &attestation));
        assert!(!keys[1].public_key().verify(UNSIGNED, &attestation));
    }

    #[test]
    fn test_aggregate_ignores_arrival_order() {
        let keys = validators(4);
        let attestations: Vec<BlsSignature> = keys.iter().map(|k| k.sign(UNSIGNED)).collect();

        let in_order = BlsSignature::aggregate(&attestations).unwrap();
        let shuffled =
            BlsSignature::aggregate([3, 1, 0, 2].iter().map(|&i| &attestations[i])).unwrap();
        assert_eq!(in_order, shuffled);

        let public_keys: Vec<BlsPublicKey> = keys.iter().map(|k| k.public_key()).collect();
        assert!(in_order.fast_aggregate_verify(UNSIGNED, &public_keys));
        let combined = BlsPublicKey::aggregate(&public_keys).unwrap();
        assert!(combined.verify(UNSIGNED, &in_order));
    }

    #[test]
    fn test_aggregate_rejects_wrong_signer_set() {
        let keys = validators(3);
        let attestations: Vec<BlsSignature> = keys[..2].iter().map(|k| k.sign(UNSIGNED)).collect();
        let partial = BlsSignature::aggregate(&attestations).unwrap();

        let everyone: Vec<BlsPublicKey> = keys.iter().map(|k| k.public_key()).collect();
        assert!(!partial.fast_aggregate_verify(UNSIGNED, &everyone));
        assert!(partial.fast_aggregate_verify(UNSIGNED, &everyone[..2]));
        assert!(!partial.fast_aggregate_verify(UNSIGNED, &Vec::<BlsPublicKey>::new()));
    }

    #[test]
    fn test_nothing_to_aggregate() {
        let no_signatures: Vec<BlsSignature> = Vec::new();
        let no_keys: Vec<BlsPublicKey> = Vec::new();
        assert_eq!(
            BlsSignature::aggregate(&no_signatures),
            Err(CryptoError::EmptyAggregation("signature"))
        );
        assert_eq!(
            BlsPublicKey::aggregate(&no_keys),
            Err(CryptoError::EmptyAggregation("public key"))
        );
    }

    #[test]
    fn test_signature_slice_length_checked_first() {
        assert_eq!(
            BlsSignature::from_slice(&[0u8; PUBLIC_KEY_LEN]),
            Err(CryptoError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: PUBLIC_KEY_LEN,
            })
        );
        assert_eq!(
            BlsSignature::from_slice(&[0xFF; SIGNATURE_LEN]),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_wire_encoding_survives_decode() {
        let keys = validators(1);
        let key = &keys[0];
        let attestation = key.sign(UNSIGNED);

        let public = BlsPublicKey::from_bytes(&key.public_key().to_bytes()).unwrap();
        let decoded = BlsSignature::from_slice(&attestation.to_bytes()).unwrap();
        assert_eq!(public, key.public_key());
        assert!(public.verify(UNSIGNED, &decoded));
        assert!(BlsPublicKey::from_bytes(&[0u8; PUBLIC_KEY_LEN]).is_err());
    }

    #[test]
    fn test_keys_order_by_compressed_bytes() {
        let mut keys: Vec<BlsPublicKey> = validators(5).iter().map(|k| k.public_key()).collect();
        keys.sort();
        assert!(keys.windows(2).all(|w| w[0].to_bytes() < w[1].to_bytes()));
    }

    #[test]
    fn test_seeded_keys_are_reproducible() {
        let a = BlsKeyPair::from_seed(&[7u8; 32]).unwrap();
        let b = BlsKeyPair::from_seed(&[7u8; 32]).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(
            BlsKeyPair::from_seed(&[7u8; 8]).err(),
            Some(CryptoError::InvalidLength {
                expected: 32,
                actual: 8
            })
        );
    }
}
