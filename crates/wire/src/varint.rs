//! Self-describing variable-length unsigned integers.
//!
//! ```text
//! prefix < 0xFD   value = prefix                    1 byte
//! prefix = 0xFD   value = next 2 bytes (u16 LE)     3 bytes
//! prefix = 0xFE   value = next 4 bytes (u32 LE)     5 bytes
//! prefix = 0xFF   value = next 8 bytes (u64 LE)     9 bytes
//! ```
//!
//! The trailing bytes are always read little-endian, matching every other
//! fixed-width field in the format.

use byteorder::{ByteOrder, LittleEndian};

use crate::DecodeError;

const PREFIX_U16: u8 = 0xFD;
const PREFIX_U32: u8 = 0xFE;
const PREFIX_U64: u8 = 0xFF;

/// A decoded variable-length integer together with the width it was encoded
/// with.
///
/// Non-minimal encodings (e.g. `FD 01 00` for `1`) are accepted on decode and
/// their width is kept, so re-encoding a decoded record reproduces its wire
/// bytes exactly. That matters for transaction hashes, which are computed over
/// the serialized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarInt {
    value: u64,
    width: u8,
}

impl VarInt {
    /// Creates the minimal encoding of `value`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        let width = if value < PREFIX_U16 as u64 {
            1
        } else if value <= u16::MAX as u64 {
            3
        } else if value <= u32::MAX as u64 {
            5
        } else {
            9
        };
        Self { value, width }
    }

    /// The decoded value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Number of bytes this integer occupies on the wire (1, 3, 5 or 9).
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.width as usize
    }

    /// Returns `self` if it already holds `value`, otherwise the minimal
    /// encoding of `value`.
    #[must_use]
    pub(crate) fn matching(self, value: u64) -> Self {
        if self.value == value {
            self
        } else {
            Self::new(value)
        }
    }

    /// Decodes a VarInt from the start of `buf`, returning it together with
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedInput`] if `buf` is empty or shorter
    /// than the prefix byte demands.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        let prefix = *buf.first().ok_or(DecodeError::TruncatedInput {
            needed: 1,
            remaining: 0,
        })?;

        let width = match prefix {
            PREFIX_U16 => 3,
            PREFIX_U32 => 5,
            PREFIX_U64 => 9,
            _ => {
                return Ok((
                    Self {
                        value: prefix as u64,
                        width: 1,
                    },
                    1,
                ))
            }
        };

        if buf.len() < width {
            return Err(DecodeError::TruncatedInput {
                needed: width as u64,
                remaining: buf.len(),
            });
        }

        let tail = &buf[1..width];
        let value = match width {
            3 => LittleEndian::read_u16(tail) as u64,
            5 => LittleEndian::read_u32(tail) as u64,
            _ => LittleEndian::read_u64(tail),
        };

        Ok((
            Self {
                value,
                width: width as u8,
            },
            width,
        ))
    }

    /// Appends the encoded form to `out`, using the stored width.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self.width {
            1 => out.push(self.value as u8),
            3 => {
                out.push(PREFIX_U16);
                out.extend_from_slice(&(self.value as u16).to_le_bytes());
            }
            5 => {
                out.push(PREFIX_U32);
                out.extend_from_slice(&(self.value as u32).to_le_bytes());
            }
            _ => {
                out.push(PREFIX_U64);
                out.extend_from_slice(&self.value.to_le_bytes());
            }
        }
    }

    /// Encodes into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

/// Decodes a VarInt from the start of `buf`, returning `(value, bytes_consumed)`.
///
/// # Errors
///
/// See [`VarInt::decode`].
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    let (v, n) = VarInt::decode(buf)?;
    Ok((v.value(), n))
}
