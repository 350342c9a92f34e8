//! Predicate packing
//!
//! A predicate is carried in a transaction access list as a run of 32-byte
//! storage keys: the raw bytes, a `0xff` delimiter, then zero padding up to
//! the next multiple of 32.

use super::errors::{CodecError, Hash};

const DELIMITER: u8 = 0xff;
const KEY_LEN: usize = 32;

/// Pack predicate bytes into storage keys.
pub fn pack_predicate(bytes: &[u8]) -> Vec<Hash> {
    let mut padded = Vec::with_capacity((bytes.len() / KEY_LEN + 1) * KEY_LEN);
    padded.extend_from_slice(bytes);
    padded.push(DELIMITER);
    padded.resize(padded.len().div_ceil(KEY_LEN) * KEY_LEN, 0);

    padded
        .chunks_exact(KEY_LEN)
        .map(|chunk| {
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(chunk);
            key
        })
        .collect()
}

/// Recover predicate bytes from storage keys.
pub fn unpack_predicate(keys: &[Hash]) -> Result<Vec<u8>, CodecError> {
    let mut bytes: Vec<u8> = keys.iter().flatten().copied().collect();

    let delimiter = bytes
        .iter()
        .rposition(|b| *b != 0)
        .ok_or(CodecError::InvalidPredicatePadding)?;
    if bytes[delimiter] != DELIMITER || bytes.len() - delimiter > KEY_LEN {
        return Err(CodecError::InvalidPredicatePadding);
    }
    bytes.truncate(delimiter);
    Ok(bytes)
}
