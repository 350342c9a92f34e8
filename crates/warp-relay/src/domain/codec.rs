//! # Wire Codec
//!
//! Fixed-layout big-endian packing used by every warp structure.
//!
//! Variable-length byte strings carry a `u32` length prefix. Decoding is
//! strict: short buffers, oversize length prefixes and trailing bytes are
//! all rejected.

use super::errors::CodecError;
use super::value_objects::CODEC_VERSION;

/// Upper bound on any length-prefixed field (256 KiB).
pub const MAX_FIELD_LEN: usize = 256 * 1024;

/// Reject a length-prefixed field longer than [`MAX_FIELD_LEN`].
///
/// Encoders call this too, so nothing is built that cannot be read back.
pub fn check_field_len(length: usize) -> Result<(), CodecError> {
    if length > MAX_FIELD_LEN {
        return Err(CodecError::LengthTooLarge {
            length,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

/// Append-only byte writer.
#[derive(Debug, Default)]
pub struct Packer {
    bytes: Vec<u8>,
}

impl Packer {
    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Write the codec version header.
    pub fn pack_version(&mut self) -> &mut Self {
        self.pack_u16(CODEC_VERSION)
    }

    pub fn pack_u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn pack_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn pack_u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Write bytes verbatim (no length prefix).
    pub fn pack_fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Write a `u32` length prefix followed by the bytes.
    pub fn pack_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.pack_u32(bytes.len() as u32);
        self.pack_fixed(bytes)
    }

    /// Consume the writer.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over an encoded buffer.
#[derive(Debug)]
pub struct Unpacker<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.bytes.len() - self.offset;
        if needed > remaining {
            return Err(CodecError::InsufficientLength {
                offset: self.offset,
                needed,
                remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    /// Read and check the codec version header.
    pub fn unpack_version(&mut self) -> Result<(), CodecError> {
        let version = self.unpack_u16()?;
        if version != CODEC_VERSION {
            return Err(CodecError::UnknownCodecVersion(version));
        }
        Ok(())
    }

    pub fn unpack_u16(&mut self) -> Result<u16, CodecError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_be_bytes(buf))
    }

    pub fn unpack_u32(&mut self) -> Result<u32, CodecError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    pub fn unpack_u64(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    /// Read exactly `N` bytes.
    pub fn unpack_fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    /// Read a `u32` length prefix and that many bytes.
    pub fn unpack_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let length = self.unpack_u32()? as usize;
        check_field_len(length)?;
        Ok(self.take(length)?.to_vec())
    }

    /// Fail if any bytes remain.
    pub fn finish(self) -> Result<(), CodecError> {
        let remaining = self.bytes.len() - self.offset;
        if remaining != 0 {
            return Err(CodecError::TrailingBytes(remaining));
        }
        Ok(())
    }
}
