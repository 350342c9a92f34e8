//! Warp precompile call encoding
//!
//! Solidity ABI encoding for the two precompile calls the relay deals with:
//! `sendWarpMessage(bytes32,address,bytes)` on the source chain and
//! `getVerifiedWarpMessage()` on the destination chain.

use super::errors::{Address, CodecError};
use super::value_objects::BlockchainId;
use warp_crypto::keccak256;

const WORD: usize = 32;

/// Four-byte function selector of a Solidity signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata of `getVerifiedWarpMessage()`.
pub fn pack_get_verified_warp_message() -> Vec<u8> {
    selector("getVerifiedWarpMessage()").to_vec()
}

/// Arguments of `sendWarpMessage`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendWarpMessageInput {
    pub destination_chain_id: BlockchainId,
    pub destination_address: Address,
    pub payload: Vec<u8>,
}

impl SendWarpMessageInput {
    const SIGNATURE: &'static str = "sendWarpMessage(bytes32,address,bytes)";

    pub fn pack(&self) -> Vec<u8> {
        let padded_len = self.payload.len().div_ceil(WORD) * WORD;
        let mut data = Vec::with_capacity(4 + 4 * WORD + padded_len);

        data.extend_from_slice(&selector(Self::SIGNATURE));
        data.extend_from_slice(self.destination_chain_id.as_bytes());
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&self.destination_address);
        data.extend_from_slice(&word(3 * WORD as u64));
        data.extend_from_slice(&word(self.payload.len() as u64));
        data.extend_from_slice(&self.payload);
        data.resize(4 + 4 * WORD + padded_len, 0);
        data
    }

    pub fn unpack(data: &[u8]) -> Result<Self, CodecError> {
        let body = data
            .strip_prefix(&selector(Self::SIGNATURE)[..])
            .ok_or(CodecError::InvalidSelector)?;

        let destination_chain_id = BlockchainId(read_array::<32>(body, 0)?);
        let address_word = read_array::<32>(body, WORD)?;
        if address_word[..12].iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidAbiEncoding);
        }
        let mut destination_address = [0u8; 20];
        destination_address.copy_from_slice(&address_word[12..]);

        let offset = read_usize(body, 2 * WORD)?;
        let length = read_usize(body, offset)?;
        let start = offset
            .checked_add(WORD)
            .ok_or(CodecError::InvalidAbiEncoding)?;
        let end = start
            .checked_add(length)
            .ok_or(CodecError::InvalidAbiEncoding)?;
        let payload = body
            .get(start..end)
            .ok_or(CodecError::InsufficientLength {
                offset: start,
                needed: length,
                remaining: body.len().saturating_sub(start),
            })?
            .to_vec();

        Ok(Self {
            destination_chain_id,
            destination_address,
            payload,
        })
    }
}

fn word(value: u64) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    out
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CodecError> {
    let slice = data
        .get(offset..offset.saturating_add(N))
        .ok_or(CodecError::InsufficientLength {
            offset,
            needed: N,
            remaining: data.len().saturating_sub(offset),
        })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, CodecError> {
    let raw = read_array::<32>(data, offset)?;
    if raw[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(CodecError::InvalidAbiEncoding);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| CodecError::InvalidAbiEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        // transfer(address,uint256)
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(pack_get_verified_warp_message().len(), 4);
    }

    #[test]
    fn test_send_warp_message_layout() {
        let input = SendWarpMessageInput {
            destination_chain_id: BlockchainId([0xAA; 32]),
            destination_address: [0xBB; 20],
            payload: vec![1; 33],
        };
        let data = input.pack();

        assert_eq!(data.len(), 4 + 4 * 32 + 64);
        assert_eq!(&data[4..36], &[0xAA; 32]);
        assert_eq!(&data[48..68], &[0xBB; 20]);
        assert_eq!(data[68 + 31], 0x60);
        assert_eq!(data[100 + 31], 33);
        assert_eq!(SendWarpMessageInput::unpack(&data).unwrap(), input);
    }

    #[test]
    fn test_unpack_rejects_other_selector() {
        let mut data = SendWarpMessageInput {
            destination_chain_id: BlockchainId([0; 32]),
            destination_address: [0; 20],
            payload: vec![],
        }
        .pack();
        data[0] ^= 0xff;
        assert_eq!(
            SendWarpMessageInput::unpack(&data),
            Err(CodecError::InvalidSelector)
        );
    }

    #[test]
    fn test_unpack_rejects_truncated_payload() {
        let mut data = SendWarpMessageInput {
            destination_chain_id: BlockchainId([0; 32]),
            destination_address: [0; 20],
            payload: vec![5; 40],
        }
        .pack();
        data.truncate(4 + 4 * 32 + 10);
        assert!(matches!(
            SendWarpMessageInput::unpack(&data),
            Err(CodecError::InsufficientLength { .. })
        ));
    }
}
