//! Record types and their wire encoding.

use byteorder::{ByteOrder, LittleEndian};

use crate::hash::{double_sha256, Hash256};
use crate::VarInt;

/// Default frame magic, in wire order (`0xD9B4BEF9` read as a u32 LE).
pub const MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

/// Size of the fixed header that is hashed to identify a block.
pub const HEADER_BYTES: usize = 4 + 32 + 32 + 4 + 4 + 4;

/// Size of the frame prefix: magic (4) + payload length (4).
pub const FRAME_PREFIX_BYTES: usize = 8;

/// The fixed 80-byte block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    /// Hash of the previous block, in wire order.
    pub prev_hash: Hash256,
    /// Aggregate root over the block's transactions, in wire order.
    pub merkle_root: Hash256,
    /// Unix seconds.
    pub timestamp: u32,
    /// Compact difficulty target.
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Serializes the header into its 80 wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        LittleEndian::write_u32(&mut out[0..4], self.version);
        out[4..36].copy_from_slice(self.prev_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        LittleEndian::write_u32(&mut out[68..72], self.timestamp);
        LittleEndian::write_u32(&mut out[72..76], self.bits);
        LittleEndian::write_u32(&mut out[76..80], self.nonce);
        out
    }

    /// The block's identifier: double SHA-256 over the 80 header bytes.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.to_bytes())
    }
}

/// One top-level record of the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Frame magic in wire order.
    pub magic: [u8; 4],
    /// Byte count of everything after the length field, as declared on the wire.
    pub declared_len: u32,
    pub header: BlockHeader,
    pub(crate) tx_count: VarInt,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Builds a block with the default [`MAGIC`] and a declared length that
    /// matches the encoded payload.
    #[must_use]
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self::with_magic(MAGIC, header, transactions)
    }

    /// Like [`Block::new`] with a custom frame magic.
    #[must_use]
    pub fn with_magic(magic: [u8; 4], header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let tx_count = VarInt::new(transactions.len() as u64);
        let mut block = Self {
            magic,
            declared_len: 0,
            header,
            tx_count,
            transactions,
        };
        block.declared_len = block.payload_len() as u32;
        block
    }

    /// See [`crate::block_hash`].
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// The magic interpreted as a little-endian u32.
    #[must_use]
    pub fn magic_value(&self) -> u32 {
        u32::from_le_bytes(self.magic)
    }

    /// Transaction count as it appeared on the wire.
    #[must_use]
    pub fn tx_count(&self) -> VarInt {
        self.tx_count
    }

    /// Timestamp in Unix seconds, or `None` when the field is zero.
    #[must_use]
    pub fn timestamp(&self) -> Option<u32> {
        (self.header.timestamp > 0).then_some(self.header.timestamp)
    }

    /// Number of payload bytes the block encodes to (header, count and
    /// transactions). For a well-formed block this equals `declared_len`.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        HEADER_BYTES
            + self.tx_count.matching(self.transactions.len() as u64).encoded_len()
            + self.transactions.iter().map(Transaction::encoded_len).sum::<usize>()
    }

    /// Encodes the full frame: magic, declared length and payload.
    ///
    /// The length field is written from `declared_len` verbatim, so a block
    /// decoded from the wire re-encodes to the same bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_PREFIX_BYTES + self.payload_len());
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.declared_len.to_le_bytes());
        out.extend_from_slice(&self.header.to_bytes());
        self.tx_count
            .matching(self.transactions.len() as u64)
            .encode(&mut out);
        for tx in &self.transactions {
            tx.encode(&mut out);
        }
        out
    }
}

/// A transaction. Owned by its block; identified only by [`Transaction::hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub(crate) input_count: VarInt,
    pub inputs: Vec<TxInput>,
    pub(crate) output_count: VarInt,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Builds a transaction with minimally encoded counts.
    #[must_use]
    pub fn new(version: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, lock_time: u32) -> Self {
        Self {
            version,
            input_count: VarInt::new(inputs.len() as u64),
            inputs,
            output_count: VarInt::new(outputs.len() as u64),
            outputs,
            lock_time,
        }
    }

    /// See [`crate::tx_hash`].
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        crate::tx_hash(self)
    }

    #[must_use]
    pub fn input_count(&self) -> VarInt {
        self.input_count
    }

    #[must_use]
    pub fn output_count(&self) -> VarInt {
        self.output_count
    }

    /// Lock time in Unix seconds, or `None` when the field is zero.
    #[must_use]
    pub fn lock_time_secs(&self) -> Option<u32> {
        (self.lock_time > 0).then_some(self.lock_time)
    }

    /// Sum of all output values.
    #[must_use]
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).fold(0u64, u64::saturating_add)
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        4 + self.input_count.matching(self.inputs.len() as u64).encoded_len()
            + self.inputs.iter().map(TxInput::encoded_len).sum::<usize>()
            + self.output_count.matching(self.outputs.len() as u64).encoded_len()
            + self.outputs.iter().map(TxOutput::encoded_len).sum::<usize>()
            + 4
    }

    /// Serializes the transaction exactly as it appears inside a block.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        self.input_count
            .matching(self.inputs.len() as u64)
            .encode(out);
        for input in &self.inputs {
            input.encode(out);
        }
        self.output_count
            .matching(self.outputs.len() as u64)
            .encode(out);
        for output in &self.outputs {
            output.encode(out);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }
}

/// A reference to an output of an earlier transaction, plus its unlocking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Hash of the referenced transaction, in wire order.
    pub prev_hash: Hash256,
    /// Index of the referenced output.
    pub prev_index: u32,
    pub(crate) script_len: VarInt,
    /// Opaque script bytes.
    pub script: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// Spends output `prev_index` of `prev_hash`.
    #[must_use]
    pub fn new(prev_hash: Hash256, prev_index: u32, script: Vec<u8>, sequence: u32) -> Self {
        Self {
            prev_hash,
            prev_index,
            script_len: VarInt::new(script.len() as u64),
            script,
            sequence,
        }
    }

    #[must_use]
    pub fn script_len(&self) -> VarInt {
        self.script_len
    }

    fn encoded_len(&self) -> usize {
        32 + 4 + self.script_len.matching(self.script.len() as u64).encoded_len()
            + self.script.len()
            + 4
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        self.script_len
            .matching(self.script.len() as u64)
            .encode(out);
        out.extend_from_slice(&self.script);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

/// A value plus the script that locks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub(crate) script_len: VarInt,
    /// Opaque script bytes.
    pub script: Vec<u8>,
}

impl TxOutput {
    /// Pays `value` satoshis to `script`.
    #[must_use]
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        Self {
            value,
            script_len: VarInt::new(script.len() as u64),
            script,
        }
    }

    #[must_use]
    pub fn script_len(&self) -> VarInt {
        self.script_len
    }

    fn encoded_len(&self) -> usize {
        8 + self.script_len.matching(self.script.len() as u64).encoded_len() + self.script.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        self.script_len
            .matching(self.script.len() as u64)
            .encode(out);
        out.extend_from_slice(&self.script);
    }
}
