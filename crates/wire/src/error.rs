use thiserror::Error;

/// Errors produced while decoding a record.
///
/// A failure anywhere in the grammar aborts the whole record: a bad input
/// aborts its transaction, which aborts its block. Partial records are never
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ended in the middle of a field.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes the next field required.
        needed: u64,
        /// Bytes that were left in the buffer.
        remaining: usize,
    },

    /// A count would need more bytes than the buffer has left, even if every
    /// element had its minimum encoded size.
    #[error("count overflow: {count} elements of at least {min_size} bytes, {remaining} remaining")]
    CountOverflow {
        /// The decoded count.
        count: u64,
        /// Minimum encoded size of one element.
        min_size: usize,
        /// Bytes that were left in the buffer.
        remaining: usize,
    },

    /// The frame does not start with the expected magic.
    #[error("bad magic: found {found:02x?}, expected {expected:02x?}")]
    BadMagic {
        /// The four bytes found at the start of the frame.
        found: [u8; 4],
        /// The magic the decoder was configured with.
        expected: [u8; 4],
    },

    /// The payload grammar finished before consuming the declared length.
    #[error("length mismatch: declared {declared} bytes, decoded {consumed}")]
    LengthMismatch {
        /// Length from the frame prefix.
        declared: u32,
        /// Bytes the grammar actually consumed.
        consumed: usize,
    },
}
