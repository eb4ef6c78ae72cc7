//! Strictly sequential record decoder.
//!
//! `Header -> TxCount -> Tx[0..count)`, each `Tx` being
//! `Version -> InCount -> In* -> OutCount -> Out* -> LockTime`. There is no
//! backtracking and no field is ever defaulted: a failed read is an error.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{Block, BlockHeader, Transaction, TxInput, TxOutput, FRAME_PREFIX_BYTES, MAGIC};
use crate::hash::Hash256;
use crate::{DecodeError, VarInt};

/// Smallest possible transaction: version + two one-byte counts + lock time.
const MIN_TX_BYTES: usize = 4 + 1 + 1 + 4;
/// Smallest possible input: hash + index + one-byte script length + sequence.
const MIN_INPUT_BYTES: usize = 32 + 4 + 1 + 4;
/// Smallest possible output: value + one-byte script length.
const MIN_OUTPUT_BYTES: usize = 8 + 1;

/// Forward-only cursor over a byte slice. Never reads past the slice.
struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: u64) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if n > remaining as u64 {
            return Err(DecodeError::TruncatedInput {
                needed: n,
                remaining,
            });
        }
        let n = n as usize;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn hash(&mut self) -> Result<Hash256, DecodeError> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(self.take(32)?);
        Ok(Hash256::from_wire(bytes))
    }

    fn varint(&mut self) -> Result<VarInt, DecodeError> {
        let (v, n) = VarInt::decode(&self.buf[self.pos..])?;
        self.pos += n;
        Ok(v)
    }

    /// Reads a count and rejects it if `count` elements of `min_size` bytes
    /// each cannot fit in what is left. Bounds the allocation that follows.
    fn count(&mut self, min_size: usize) -> Result<VarInt, DecodeError> {
        let count = self.varint()?;
        let remaining = self.remaining();
        let fits = count
            .value()
            .checked_mul(min_size as u64)
            .is_some_and(|needed| needed <= remaining as u64);
        if !fits {
            return Err(DecodeError::CountOverflow {
                count: count.value(),
                min_size,
                remaining,
            });
        }
        Ok(count)
    }
}

/// Decodes one framed block from the start of `buf`, expecting the default
/// [`MAGIC`].
///
/// Returns the block and the number of bytes consumed, which is always
/// `8 + declared_len`. Bytes after the frame are left untouched.
///
/// # Errors
///
/// - [`DecodeError::TruncatedInput`] if `buf` ends before the frame does
///   (including a declared length larger than what is left).
/// - [`DecodeError::CountOverflow`] for an implausibly large count.
/// - [`DecodeError::BadMagic`] if the frame does not start with the magic.
/// - [`DecodeError::LengthMismatch`] if the payload decodes in fewer bytes
///   than declared.
pub fn decode_block(buf: &[u8]) -> Result<(Block, usize), DecodeError> {
    decode_block_with_magic(buf, MAGIC)
}

/// Like [`decode_block`] with a caller-supplied magic.
pub fn decode_block_with_magic(buf: &[u8], magic: [u8; 4]) -> Result<(Block, usize), DecodeError> {
    let mut cur = ByteCursor::new(buf);

    let mut found = [0u8; 4];
    found.copy_from_slice(cur.take(4)?);
    if found != magic {
        return Err(DecodeError::BadMagic {
            found,
            expected: magic,
        });
    }

    let declared_len = cur.u32()?;
    let payload = cur.take(declared_len as u64)?;

    let mut body = ByteCursor::new(payload);
    let header = BlockHeader {
        version: body.u32()?,
        prev_hash: body.hash()?,
        merkle_root: body.hash()?,
        timestamp: body.u32()?,
        bits: body.u32()?,
        nonce: body.u32()?,
    };

    let tx_count = body.count(MIN_TX_BYTES)?;
    let mut transactions = Vec::with_capacity(tx_count.value() as usize);
    for _ in 0..tx_count.value() {
        transactions.push(read_transaction(&mut body)?);
    }

    if body.pos != payload.len() {
        return Err(DecodeError::LengthMismatch {
            declared: declared_len,
            consumed: body.pos,
        });
    }

    let block = Block {
        magic: found,
        declared_len,
        header,
        tx_count,
        transactions,
    };
    Ok((block, FRAME_PREFIX_BYTES + payload.len()))
}

/// Decodes a single transaction from the start of `buf`, returning it with
/// the number of bytes consumed.
///
/// # Errors
///
/// [`DecodeError::TruncatedInput`] or [`DecodeError::CountOverflow`].
pub fn decode_transaction(buf: &[u8]) -> Result<(Transaction, usize), DecodeError> {
    let mut cur = ByteCursor::new(buf);
    let tx = read_transaction(&mut cur)?;
    Ok((tx, cur.pos))
}

fn read_transaction(cur: &mut ByteCursor<'_>) -> Result<Transaction, DecodeError> {
    let version = cur.u32()?;

    let input_count = cur.count(MIN_INPUT_BYTES)?;
    let mut inputs = Vec::with_capacity(input_count.value() as usize);
    for _ in 0..input_count.value() {
        inputs.push(read_input(cur)?);
    }

    let output_count = cur.count(MIN_OUTPUT_BYTES)?;
    let mut outputs = Vec::with_capacity(output_count.value() as usize);
    for _ in 0..output_count.value() {
        outputs.push(read_output(cur)?);
    }

    let lock_time = cur.u32()?;

    Ok(Transaction {
        version,
        input_count,
        inputs,
        output_count,
        outputs,
        lock_time,
    })
}

fn read_input(cur: &mut ByteCursor<'_>) -> Result<TxInput, DecodeError> {
    let prev_hash = cur.hash()?;
    let prev_index = cur.u32()?;
    let script_len = cur.varint()?;
    let script = cur.take(script_len.value())?.to_vec();
    let sequence = cur.u32()?;
    Ok(TxInput {
        prev_hash,
        prev_index,
        script_len,
        script,
        sequence,
    })
}

fn read_output(cur: &mut ByteCursor<'_>) -> Result<TxOutput, DecodeError> {
    let value = cur.u64()?;
    let script_len = cur.varint()?;
    let script = cur.take(script_len.value())?.to_vec();
    Ok(TxOutput {
        value,
        script_len,
        script,
    })
}
