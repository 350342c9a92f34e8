//! # Certified Messages
//!
//! An unsigned warp message together with the aggregate BLS signature of a
//! quorum of validators and the bitset naming them.
//!
//! Bit `i` of the signer bitset (least significant bit first within each
//! byte) refers to validator ordinal `i` of the [`ValidatorSet`].

use super::codec::{check_field_len, Packer, Unpacker};
use super::errors::{CertificateError, CodecError};
use super::message::UnsignedMessage;
use super::validators::ValidatorSet;
use super::value_objects::MessageId;
use bitvec::prelude::*;
use std::sync::Arc;
use warp_crypto::{BlsPublicKey, BlsSignature, SIGNATURE_LEN};

/// Type discriminator of [`BitSetSignature`].
pub const BITSET_SIGNATURE_TYPE_ID: u32 = 0;

/// Set of validator ordinals that contributed to an aggregate signature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerBitSet {
    bits: BitVec<u8, Lsb0>,
}

impl SignerBitSet {
    /// Empty bitset sized for `validator_count` ordinals.
    pub fn with_capacity(validator_count: usize) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; validator_count.div_ceil(8) * 8],
        }
    }

    /// Bitset over a raw byte representation.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bits: BitVec::from_vec(bytes),
        }
    }

    /// Set the bit for `ordinal`, growing as needed.
    ///
    /// Returns `false` if the bit was already set.
    pub fn insert(&mut self, ordinal: usize) -> bool {
        if ordinal >= self.bits.len() {
            self.bits.resize((ordinal + 1).div_ceil(8) * 8, false);
        }
        !self.bits.replace(ordinal, true)
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.bits.get(ordinal).map(|b| *b).unwrap_or(false)
    }

    /// Number of signers (Hamming weight).
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Set ordinals in ascending order.
    pub fn ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

impl FromIterator<usize> for SignerBitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::default();
        for ordinal in iter {
            set.insert(ordinal);
        }
        set
    }
}

/// Aggregate signature over a set of signers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitSetSignature {
    pub signers: SignerBitSet,
    pub signature: BlsSignature,
}

/// Unsigned message plus quorum signature. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertifiedMessage {
    unsigned: Arc<UnsignedMessage>,
    signature: BitSetSignature,
    bytes: Vec<u8>,
}

impl CertifiedMessage {
    /// Build a certified message and its canonical encoding.
    pub fn new(
        unsigned: Arc<UnsignedMessage>,
        signature: BitSetSignature,
    ) -> Result<Self, CertificateError> {
        if signature.signers.is_empty() {
            return Err(CertificateError::EmptySignerSet);
        }
        check_field_len(unsigned.bytes().len())?;

        let signers = signature.signers.as_bytes();
        let mut packer =
            Packer::with_capacity(2 + 4 + unsigned.bytes().len() + 4 + 4 + signers.len() + 96);
        packer
            .pack_version()
            .pack_bytes(unsigned.bytes())
            .pack_u32(BITSET_SIGNATURE_TYPE_ID)
            .pack_bytes(signers)
            .pack_fixed(&signature.signature.to_bytes());
        let bytes = packer.finish();

        Ok(Self {
            unsigned,
            signature,
            bytes,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CertificateError> {
        let mut unpacker = Unpacker::new(bytes);
        unpacker.unpack_version()?;
        let unsigned = UnsignedMessage::parse(&unpacker.unpack_bytes()?)?;
        let type_id = unpacker.unpack_u32()?;
        if type_id != BITSET_SIGNATURE_TYPE_ID {
            return Err(CodecError::UnknownTypeId(type_id).into());
        }
        let signers = SignerBitSet::from_bytes(unpacker.unpack_bytes()?);
        let raw_signature = unpacker.unpack_fixed::<SIGNATURE_LEN>()?;
        unpacker.finish()?;

        let signature = BlsSignature::from_bytes(&raw_signature)
            .map_err(|_| CertificateError::MalformedSignature)?;

        Self::new(Arc::new(unsigned), BitSetSignature { signers, signature })
    }

    pub fn id(&self) -> MessageId {
        self.unsigned.id()
    }

    pub fn unsigned_message(&self) -> &UnsignedMessage {
        &self.unsigned
    }

    pub fn signature(&self) -> &BitSetSignature {
        &self.signature
    }

    pub fn signers(&self) -> &SignerBitSet {
        &self.signature.signers
    }

    /// Canonical encoding; this is the predicate carried by relay transactions.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Verify the certificate as the destination chain would.
    ///
    /// Every signer bit must name a validator, the signers must carry at
    /// least `quorum` weight, and the aggregate must verify over the
    /// unsigned message bytes.
    pub fn verify(&self, validators: &ValidatorSet, quorum: u64) -> Result<(), CertificateError> {
        let mut public_keys: Vec<BlsPublicKey> = Vec::with_capacity(self.signers().len());
        let mut weight = 0u64;
        for ordinal in self.signers().ordinals() {
            let validator = validators
                .get(ordinal)
                .ok_or(CertificateError::InvalidSigner {
                    ordinal,
                    set_size: validators.len(),
                })?;
            public_keys.push(validator.public_key.clone());
            weight = weight.saturating_add(validator.weight);
        }

        if weight < quorum {
            return Err(CertificateError::InsufficientWeight {
                have: weight,
                need: quorum,
            });
        }

        if !self
            .signature
            .signature
            .fast_aggregate_verify(self.unsigned.bytes(), &public_keys)
        {
            return Err(CertificateError::InvalidSignature);
        }
        Ok(())
    }
}
