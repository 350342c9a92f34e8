//! # Warp Messages
//!
//! Unsigned warp messages as announced by the source chain, and the
//! addressed payload they carry.

use super::codec::{check_field_len, Packer, Unpacker, MAX_FIELD_LEN};
use super::errors::{Address, CodecError, Hash};
use super::value_objects::{BlockchainId, MessageId};
use warp_crypto::{keccak256, sha256};

/// Type discriminator of [`AddressedPayload`].
pub const ADDRESSED_PAYLOAD_TYPE_ID: u32 = 0;

/// Bytes an unsigned message adds around its payload.
pub const UNSIGNED_HEADER_LEN: usize = 2 + 4 + 32 + 4;

/// Largest payload whose unsigned message still fits in a certificate.
pub const MAX_UNSIGNED_PAYLOAD_LEN: usize = MAX_FIELD_LEN - UNSIGNED_HEADER_LEN;

/// Length of the fixed-layout [`TestPayload`] encoding.
pub const TEST_PAYLOAD_LEN: usize = 32 + 20 + 8;

/// Unsigned warp message.
///
/// Immutable once built: the canonical encoding and the identifier are
/// computed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedMessage {
    network_id: u32,
    source_chain_id: BlockchainId,
    payload: Vec<u8>,
    bytes: Vec<u8>,
    id: MessageId,
}

impl UnsignedMessage {
    /// Build a message and compute its encoding and identifier.
    pub fn new(network_id: u32, source_chain_id: BlockchainId, payload: Vec<u8>) -> Self {
        let mut packer = Packer::with_capacity(UNSIGNED_HEADER_LEN + payload.len());
        packer
            .pack_version()
            .pack_u32(network_id)
            .pack_fixed(source_chain_id.as_bytes())
            .pack_bytes(&payload);
        let bytes = packer.finish();
        let id = MessageId(sha256(&bytes));
        Self {
            network_id,
            source_chain_id,
            payload,
            bytes,
            id,
        }
    }

    /// Decode a message from raw event data.
    ///
    /// The whole encoding must fit a certificate field, otherwise the
    /// message could be signed but never relayed.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        check_field_len(bytes.len())?;
        let mut unpacker = Unpacker::new(bytes);
        unpacker.unpack_version()?;
        let network_id = unpacker.unpack_u32()?;
        let source_chain_id = BlockchainId(unpacker.unpack_fixed::<32>()?);
        let payload = unpacker.unpack_bytes()?;
        unpacker.finish()?;

        Ok(Self {
            network_id,
            source_chain_id,
            payload,
            bytes: bytes.to_vec(),
            id: MessageId(sha256(bytes)),
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn source_chain_id(&self) -> BlockchainId {
        self.source_chain_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Canonical encoding; this is what validators sign.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Payload addressed from a source contract to a destination contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressedPayload {
    /// Contract that sent the message on the source chain.
    pub source_address: Address,
    /// Chain the message is meant for.
    pub destination_chain_id: BlockchainId,
    /// Contract that receives the message.
    pub destination_address: Address,
    /// Application payload.
    pub payload: Vec<u8>,
}

impl AddressedPayload {
    pub fn new(
        source_address: Address,
        destination_chain_id: BlockchainId,
        destination_address: Address,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            source_address,
            destination_chain_id,
            destination_address,
            payload,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packer = Packer::with_capacity(2 + 4 + 20 + 32 + 20 + 4 + self.payload.len());
        packer
            .pack_version()
            .pack_u32(ADDRESSED_PAYLOAD_TYPE_ID)
            .pack_fixed(&self.source_address)
            .pack_fixed(self.destination_chain_id.as_bytes())
            .pack_fixed(&self.destination_address)
            .pack_bytes(&self.payload);
        packer.finish()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut unpacker = Unpacker::new(bytes);
        unpacker.unpack_version()?;
        let type_id = unpacker.unpack_u32()?;
        if type_id != ADDRESSED_PAYLOAD_TYPE_ID {
            return Err(CodecError::UnknownTypeId(type_id));
        }
        let source_address = unpacker.unpack_fixed::<20>()?;
        let destination_chain_id = BlockchainId(unpacker.unpack_fixed::<32>()?);
        let destination_address = unpacker.unpack_fixed::<20>()?;
        let payload = unpacker.unpack_bytes()?;
        unpacker.finish()?;

        Ok(Self {
            source_address,
            destination_chain_id,
            destination_address,
            payload,
        })
    }

    /// Identifier used to follow a message from send to relay:
    /// Keccak-256 of the inner application payload.
    pub fn tracking_id(&self) -> Hash {
        keccak256(&self.payload)
    }
}

/// Fixed-layout payload used by the load simulation:
/// `destination_chain_id (32) ‖ address (20) ‖ nonce (u64 BE)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestPayload {
    pub destination_chain_id: BlockchainId,
    pub address: Address,
    pub nonce: u64,
}

impl TestPayload {
    pub fn new(destination_chain_id: BlockchainId, address: Address, nonce: u64) -> Self {
        Self {
            destination_chain_id,
            address,
            nonce,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packer = Packer::with_capacity(TEST_PAYLOAD_LEN);
        packer
            .pack_fixed(self.destination_chain_id.as_bytes())
            .pack_fixed(&self.address)
            .pack_u64(self.nonce);
        packer.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != TEST_PAYLOAD_LEN {
            return Err(CodecError::InvalidPayloadLength {
                expected: TEST_PAYLOAD_LEN,
                actual: bytes.len(),
            });
        }
        let mut unpacker = Unpacker::new(bytes);
        let destination_chain_id = BlockchainId(unpacker.unpack_fixed::<32>()?);
        let address = unpacker.unpack_fixed::<20>()?;
        let nonce = unpacker.unpack_u64()?;
        unpacker.finish()?;
        Ok(Self {
            destination_chain_id,
            address,
            nonce,
        })
    }
}
