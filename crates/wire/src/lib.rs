//! # Wire - Block Dump Record Codec
//!
//! Decodes (and re-encodes) the records stored in a block dump: one
//! length-prefixed [`Block`] per frame, each holding a list of
//! [`Transaction`]s, which in turn hold [`TxInput`]s and [`TxOutput`]s.
//!
//! ## Frame Format
//!
//! ```text
//! [magic: 4 bytes][payload_len: u32 LE][payload ...]
//! ```
//!
//! `payload_len` counts every byte after itself.
//!
//! ## Payload Grammar
//!
//! ```text
//! Block   = version(u32) prev_hash(32) merkle_root(32) timestamp(u32)
//!           bits(u32) nonce(u32) tx_count(VarInt) Tx*
//! Tx      = version(u32) in_count(VarInt) In* out_count(VarInt) Out* lock_time(u32)
//! In      = prev_hash(32) prev_index(u32) script_len(VarInt) script sequence(u32)
//! Out     = value(u64) script_len(VarInt) script
//! ```
//!
//! All fixed-width integers are little-endian, and so are the trailing bytes
//! of a [`VarInt`]. Hashes are stored in wire (little-endian) order and are
//! only reversed when rendered as text.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wire::decode_block;
//!
//! let bytes = std::fs::read("block.bin").unwrap();
//! let (block, consumed) = decode_block(&bytes).unwrap();
//! println!("{} ({} bytes, {} txs)", block.hash(), consumed, block.transactions.len());
//! ```

mod block;
mod decode;
mod error;
mod hash;
mod varint;

pub use block::{
    Block, BlockHeader, Transaction, TxInput, TxOutput, FRAME_PREFIX_BYTES, HEADER_BYTES, MAGIC,
};
pub use decode::{decode_block, decode_block_with_magic, decode_transaction};
pub use error::DecodeError;
pub use hash::{block_hash, double_sha256, tx_hash, Hash256, ParseHashError};
pub use varint::{decode_varint, VarInt};

#[cfg(test)]
mod tests;
