//! # Destination-Chain Transactions
//!
//! EIP-1559 (type `0x02`) transactions in RLP form, the predicate variant
//! that carries a certified warp message in its access list, and the
//! [`RelayTx`] the transmitter hands to its consumer.

use super::abi::{pack_get_verified_warp_message, SendWarpMessageInput};
use super::errors::{Address, CodecError, Hash};
use super::predicate::{pack_predicate, unpack_predicate};
use super::value_objects::WARP_PRECOMPILE_ADDRESS;
use primitive_types::U256;
use rlp::{DecoderError, Rlp, RlpStream};
use warp_crypto::{keccak256, recover_address, CryptoError, RecoverableSignature};

/// EIP-2718 type byte of a dynamic-fee transaction.
pub const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// One gwei in wei.
pub const GWEI: u64 = 1_000_000_000;

/// Gas limit of a relay (predicate) transaction.
pub const RELAY_GAS_LIMIT: u64 = 5_000_000;

/// Gas limit of a `sendWarpMessage` transaction.
pub const SEND_WARP_GAS_LIMIT: u64 = 200_000;

/// Fee caps applied to outbound transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeePolicy {
    pub gas_fee_cap: U256,
    pub gas_tip_cap: U256,
}

impl FeePolicy {
    pub fn from_gwei(gas_fee_cap: u64, gas_tip_cap: u64) -> Self {
        Self {
            gas_fee_cap: U256::from(gas_fee_cap) * U256::from(GWEI),
            gas_tip_cap: U256::from(gas_tip_cap) * U256::from(GWEI),
        }
    }
}

impl Default for FeePolicy {
    /// 225 gwei fee cap, 1 gwei tip.
    fn default() -> Self {
        Self::from_gwei(225, 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<Hash>,
}

/// Unsigned dynamic-fee transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicFeeTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_tip_cap: U256,
    pub gas_fee_cap: U256,
    pub gas: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
}

impl DynamicFeeTx {
    /// Transaction whose access list carries `predicate` at `predicater`.
    #[allow(clippy::too_many_arguments)]
    pub fn predicate_tx(
        chain_id: u64,
        nonce: u64,
        to: Address,
        gas: u64,
        fees: FeePolicy,
        value: U256,
        data: Vec<u8>,
        mut access_list: Vec<AccessListItem>,
        predicater: Address,
        predicate: &[u8],
    ) -> Self {
        access_list.push(AccessListItem {
            address: predicater,
            storage_keys: pack_predicate(predicate),
        });
        Self {
            chain_id,
            nonce,
            gas_tip_cap: fees.gas_tip_cap,
            gas_fee_cap: fees.gas_fee_cap,
            gas,
            to,
            value,
            data,
            access_list,
        }
    }

    /// Relay transaction for a certified message: calls
    /// `getVerifiedWarpMessage()` on the warp precompile with the message
    /// bytes as predicate.
    pub fn relay(chain_id: u64, nonce: u64, fees: FeePolicy, certified_bytes: &[u8]) -> Self {
        Self::predicate_tx(
            chain_id,
            nonce,
            WARP_PRECOMPILE_ADDRESS,
            RELAY_GAS_LIMIT,
            fees,
            U256::zero(),
            pack_get_verified_warp_message(),
            Vec::new(),
            WARP_PRECOMPILE_ADDRESS,
            certified_bytes,
        )
    }

    /// Source-chain transaction calling `sendWarpMessage` on the warp
    /// precompile.
    pub fn send_warp_message(
        chain_id: u64,
        nonce: u64,
        fees: FeePolicy,
        input: &SendWarpMessageInput,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            gas_tip_cap: fees.gas_tip_cap,
            gas_fee_cap: fees.gas_fee_cap,
            gas: SEND_WARP_GAS_LIMIT,
            to: WARP_PRECOMPILE_ADDRESS,
            value: U256::zero(),
            data: input.pack(),
            access_list: Vec::new(),
        }
    }

    /// Predicate stored under `predicater`, if any.
    pub fn predicate(&self, predicater: &Address) -> Result<Vec<u8>, CodecError> {
        let item = self
            .access_list
            .iter()
            .find(|item| &item.address == predicater)
            .ok_or(CodecError::MissingPredicate)?;
        unpack_predicate(&item.storage_keys)
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.gas_tip_cap);
        stream.append(&self.gas_fee_cap);
        stream.append(&self.gas);
        stream.append(&self.to.to_vec());
        stream.append(&self.value);
        stream.append(&self.data);
        stream.begin_list(self.access_list.len());
        for item in &self.access_list {
            stream.begin_list(2);
            stream.append(&item.address.to_vec());
            stream.begin_list(item.storage_keys.len());
            for key in &item.storage_keys {
                stream.append(&key.to_vec());
            }
        }
    }

    /// `keccak256(0x02 ‖ rlp([chain_id, nonce, tip, fee_cap, gas, to, value, data, access_list]))`
    pub fn signing_hash(&self) -> Hash {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        let mut preimage = vec![DYNAMIC_FEE_TX_TYPE];
        preimage.extend_from_slice(&stream.out());
        keccak256(&preimage)
    }
}

/// Signed transaction with its canonical encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: DynamicFeeTx,
    signature: RecoverableSignature,
    raw: Vec<u8>,
    hash: Hash,
}

impl SignedTransaction {
    pub fn new(tx: DynamicFeeTx, signature: RecoverableSignature) -> Self {
        let mut stream = RlpStream::new_list(12);
        tx.append_fields(&mut stream);
        stream.append(&signature.y_parity);
        stream.append(&U256::from_big_endian(&signature.r));
        stream.append(&U256::from_big_endian(&signature.s));

        let mut raw = vec![DYNAMIC_FEE_TX_TYPE];
        raw.extend_from_slice(&stream.out());
        let hash = keccak256(&raw);

        Self {
            tx,
            signature,
            raw,
            hash,
        }
    }

    /// Decode an EIP-2718 encoded dynamic-fee transaction.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let (&tx_type, body) = raw.split_first().ok_or(CodecError::InsufficientLength {
            offset: 0,
            needed: 1,
            remaining: 0,
        })?;
        if tx_type != DYNAMIC_FEE_TX_TYPE {
            return Err(CodecError::UnknownTypeId(tx_type as u32));
        }

        let rlp = Rlp::new(body);
        let info = rlp.payload_info().map_err(rlp_error)?;
        if info.total() != body.len() {
            return Err(CodecError::TrailingBytes(body.len().saturating_sub(info.total())));
        }
        if rlp.item_count().map_err(rlp_error)? != 12 {
            return Err(CodecError::Rlp("expected 12 fields".to_string()));
        }

        let mut access_list = Vec::new();
        for item in rlp.at(8).map_err(rlp_error)?.iter() {
            let address = fixed::<20>(item.val_at::<Vec<u8>>(0).map_err(rlp_error)?)?;
            let mut storage_keys = Vec::new();
            for key in item.at(1).map_err(rlp_error)?.iter() {
                storage_keys.push(fixed::<32>(key.as_val::<Vec<u8>>().map_err(rlp_error)?)?);
            }
            access_list.push(AccessListItem {
                address,
                storage_keys,
            });
        }

        let tx = DynamicFeeTx {
            chain_id: rlp.val_at(0).map_err(rlp_error)?,
            nonce: rlp.val_at(1).map_err(rlp_error)?,
            gas_tip_cap: rlp.val_at(2).map_err(rlp_error)?,
            gas_fee_cap: rlp.val_at(3).map_err(rlp_error)?,
            gas: rlp.val_at(4).map_err(rlp_error)?,
            to: fixed::<20>(rlp.val_at::<Vec<u8>>(5).map_err(rlp_error)?)?,
            value: rlp.val_at(6).map_err(rlp_error)?,
            data: rlp.val_at(7).map_err(rlp_error)?,
            access_list,
        };

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        rlp.val_at::<U256>(10).map_err(rlp_error)?.to_big_endian(&mut r);
        rlp.val_at::<U256>(11).map_err(rlp_error)?.to_big_endian(&mut s);
        let signature = RecoverableSignature {
            r,
            s,
            y_parity: rlp.val_at(9).map_err(rlp_error)?,
        };

        Ok(Self::new(tx, signature))
    }

    pub fn tx(&self) -> &DynamicFeeTx {
        &self.tx
    }

    pub fn signature(&self) -> &RecoverableSignature {
        &self.signature
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    /// EIP-2718 encoding.
    pub fn encode(&self) -> &[u8] {
        &self.raw
    }

    /// Transaction hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Recover the sender address from the signature.
    pub fn sender(&self) -> Result<Address, CryptoError> {
        recover_address(&self.tx.signing_hash(), &self.signature)
    }
}

/// Signed relay transaction plus the id used to follow its message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayTx {
    pub tx: SignedTransaction,
    pub tracking_id: Hash,
}

fn rlp_error(err: DecoderError) -> CodecError {
    CodecError::Rlp(err.to_string())
}

fn fixed<const N: usize>(bytes: Vec<u8>) -> Result<[u8; N], CodecError> {
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CodecError::InvalidPayloadLength {
            expected: N,
            actual: bytes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_crypto::Secp256k1KeyPair;

    fn sign(tx: DynamicFeeTx, key: &Secp256k1KeyPair) -> SignedTransaction {
        let signature = key.sign_prehash(&tx.signing_hash()).unwrap();
        SignedTransaction::new(tx, signature)
    }

    #[test]
    fn test_default_fee_policy() {
        let fees = FeePolicy::default();
        assert_eq!(fees.gas_fee_cap, U256::from(225_000_000_000u64));
        assert_eq!(fees.gas_tip_cap, U256::from(1_000_000_000u64));
    }

    #[test]
    fn test_relay_tx_shape() {
        let tx = DynamicFeeTx::relay(43114, 7, FeePolicy::default(), &[0xAB; 70]);

        assert_eq!(tx.nonce, 7);
        assert_eq!(tx.gas, RELAY_GAS_LIMIT);
        assert_eq!(tx.to, WARP_PRECOMPILE_ADDRESS);
        assert!(tx.value.is_zero());
        assert_eq!(tx.data, pack_get_verified_warp_message());
        assert_eq!(tx.access_list.len(), 1);
        assert_eq!(tx.access_list[0].storage_keys.len(), 3);
        assert_eq!(tx.predicate(&WARP_PRECOMPILE_ADDRESS).unwrap(), vec![0xAB; 70]);
    }

    #[test]
    fn test_send_warp_message_tx_shape() {
        let input = SendWarpMessageInput {
            destination_chain_id: crate::domain::BlockchainId([2; 32]),
            destination_address: [3; 20],
            payload: vec![4; 10],
        };
        let tx = DynamicFeeTx::send_warp_message(1, 0, FeePolicy::default(), &input);

        assert_eq!(tx.gas, SEND_WARP_GAS_LIMIT);
        assert!(tx.access_list.is_empty());
        assert_eq!(SendWarpMessageInput::unpack(&tx.data).unwrap(), input);
    }

    #[test]
    fn test_missing_predicate() {
        let tx = DynamicFeeTx::relay(1, 0, FeePolicy::default(), &[1]);
        assert_eq!(tx.predicate(&[9u8; 20]), Err(CodecError::MissingPredicate));
    }

    #[test]
    fn test_signed_encoding_is_typed() {
        let key = Secp256k1KeyPair::generate();
        let signed = sign(DynamicFeeTx::relay(1, 0, FeePolicy::default(), &[1, 2]), &key);

        assert_eq!(signed.encode()[0], DYNAMIC_FEE_TX_TYPE);
        assert_eq!(signed.hash(), keccak256(signed.encode()));

        let rlp = Rlp::new(&signed.encode()[1..]);
        assert_eq!(rlp.item_count().unwrap(), 12);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 1);
    }

    #[test]
    fn test_sender_recovery() {
        let key = Secp256k1KeyPair::generate();
        let signed = sign(DynamicFeeTx::relay(99, 3, FeePolicy::default(), &[5; 10]), &key);
        assert_eq!(signed.sender().unwrap(), key.address());
    }

    #[test]
    fn test_decode_recovers_transaction() {
        let key = Secp256k1KeyPair::generate();
        let signed = sign(DynamicFeeTx::relay(5, 11, FeePolicy::default(), &[3; 40]), &key);

        let decoded = SignedTransaction::decode(signed.encode()).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.sender().unwrap(), key.address());
    }

    #[test]
    fn test_decode_rejects_legacy_type() {
        assert_eq!(
            SignedTransaction::decode(&[0x01, 0xc0]),
            Err(CodecError::UnknownTypeId(1))
        );
        assert!(SignedTransaction::decode(&[]).is_err());
    }

    #[test]
    fn test_signing_hash_changes_with_nonce() {
        let a = DynamicFeeTx::relay(1, 0, FeePolicy::default(), &[1]);
        let b = DynamicFeeTx::relay(1, 1, FeePolicy::default(), &[1]);
        assert_ne!(a.signing_hash(), b.signing_hash());
    }
}
