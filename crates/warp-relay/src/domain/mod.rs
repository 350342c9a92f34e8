//! # Domain Module
//!
//! Messages, certificates, validator sets, aggregation state and
//! destination-chain transactions.

pub mod abi;
pub mod attestation;
pub mod certified;
pub mod codec;
pub mod errors;
pub mod invariants;
pub mod message;
pub mod predicate;
pub mod transaction;
pub mod validators;
pub mod value_objects;

pub use abi::{pack_get_verified_warp_message, selector, SendWarpMessageInput};
pub use attestation::{AggregationRecord, PartialAttestation, RecordStore};
pub use certified::{BitSetSignature, CertifiedMessage, SignerBitSet, BITSET_SIGNATURE_TYPE_ID};
pub use errors::*;
pub use invariants::*;
pub use message::{
    AddressedPayload, TestPayload, UnsignedMessage, MAX_UNSIGNED_PAYLOAD_LEN, TEST_PAYLOAD_LEN,
    UNSIGNED_HEADER_LEN,
};
pub use predicate::{pack_predicate, unpack_predicate};
pub use transaction::{
    AccessListItem, DynamicFeeTx, FeePolicy, RelayTx, SignedTransaction, DYNAMIC_FEE_TX_TYPE,
    GWEI, RELAY_GAS_LIMIT, SEND_WARP_GAS_LIMIT,
};
pub use validators::{Validator, ValidatorSet, DEFAULT_WEIGHT};
pub use value_objects::*;
