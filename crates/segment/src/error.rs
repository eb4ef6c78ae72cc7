use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use scanner::ScanError;
use thiserror::Error;
use wire::{DecodeError, Hash256};

/// What a failed lookup was searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Height(u64),
    Transaction(Hash256),
    Block(Hash256),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Height(h) => write!(f, "height {}", h),
            Lookup::Transaction(h) => write!(f, "transaction {}", h),
            Lookup::Block(h) => write!(f, "block {}", h),
        }
    }
}

#[derive(Debug, Error)]
pub enum SegmentError {
    /// No segment covers the height, or no record in the scanned range has
    /// the hash.
    #[error("{0} not found")]
    NotFound(Lookup),

    /// The height is zero or past the last chunked record.
    #[error("height {height} is out of range (last chunked height is {tip})")]
    OutOfRange { height: u64, tip: u64 },

    /// There is no segment before the one starting at `floor`.
    #[error("no segment before height {floor}")]
    NoPrevious { floor: u64 },

    /// A segment's bytes do not match what its name and framing promise.
    #[error("corrupt segment {}: {reason} (offset {offset})", .path.display())]
    CorruptSegment {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// A frame inside a segment failed to decode.
    #[error("failed to decode height {height} in {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        height: u64,
        #[source]
        source: DecodeError,
    },

    #[error("invalid segment file name '{0}'")]
    InvalidName(String),

    /// Two segments in the directory claim the same heights.
    #[error("segments {first} and {second} overlap")]
    Overlap { first: String, second: String },

    #[error("manifest line {line}: {reason}")]
    InvalidManifest { line: usize, reason: String },

    #[error("checksum mismatch for {filename}: manifest says {expected:08x}, file has {actual:08x}")]
    ChecksumMismatch {
        filename: String,
        expected: u32,
        actual: u32,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl SegmentError {
    /// Maps a strict-scan failure inside `path` onto the segment taxonomy.
    ///
    /// `EndOfInput` is not an error at this level; callers handle it before
    /// converting.
    pub(crate) fn from_scan(path: &Path, err: ScanError) -> Self {
        let (offset, reason) = match err {
            ScanError::Io(e) => return SegmentError::Io(e),
            ScanError::EndOfInput => (0, "unexpected end of input".to_string()),
            ScanError::TruncatedInput { offset, needed } => {
                (offset, format!("record truncated, {} bytes missing", needed))
            }
            ScanError::CorruptSegment { offset, found } => {
                (offset, format!("expected magic, found {:02x?}", found))
            }
            ScanError::RecordTooLarge { offset, len, max } => {
                (offset, format!("record declares {} bytes (max {})", len, max))
            }
        };
        SegmentError::CorruptSegment {
            path: path.to_path_buf(),
            offset,
            reason,
        }
    }
}
