//! Content-addressed identifiers: SHA-256 applied twice.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{Block, Transaction};

/// A 32-byte hash kept in wire (little-endian) byte order.
///
/// `Display` and `FromStr` use the conventional text form, which is the
/// byte-reversed hex string. [`Hash256::as_bytes`] always returns wire order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash (used as `prev_hash` by a chain's first block).
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Wraps bytes that are already in wire order.
    #[must_use]
    pub const fn from_wire(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes in wire order.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Bytes in display order (reversed).
    #[must_use]
    pub fn to_display_bytes(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_display_bytes()))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

/// Error returned when parsing a [`Hash256`] from text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseHashError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Hash256 {
    type Err = ParseHashError;

    /// Parses the display form (byte-reversed hex).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim())?;
        if raw.len() != 32 {
            return Err(ParseHashError::Length(raw.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        bytes.reverse();
        Ok(Self(bytes))
    }
}

/// `sha256(sha256(data))`, returned in wire order.
#[must_use]
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first.as_slice());
    let mut out = [0u8; 32];
    out.copy_from_slice(second.as_slice());
    Hash256(out)
}

/// Hash of a block: the double digest of its 80-byte header.
///
/// Magic and declared length are not part of the hashed bytes.
#[must_use]
pub fn block_hash(block: &Block) -> Hash256 {
    block.header.hash()
}

/// Hash of a transaction: the double digest of its serialized form.
#[must_use]
pub fn tx_hash(tx: &Transaction) -> Hash256 {
    double_sha256(&tx.to_bytes())
}
