//! # Scanner - Record Boundary Detection
//!
//! Walks a raw byte stream frame by frame:
//!
//! ```text
//! [garbage ...][magic: 4][payload_len: u32 LE][payload ...][magic: 4]...
//! ```
//!
//! Two ways of finding the next frame are offered:
//!
//! - **Tolerant** ([`RecordScanner::next_record_start`]): slides a 4-byte
//!   window over the stream one byte at a time until it matches the magic.
//!   Everything before the match is discarded. Used while ingesting a dump,
//!   which may contain leading garbage or a torn record.
//! - **Strict** ([`RecordScanner::expect_record_start`]): the next four bytes
//!   must be the magic, otherwise the stream is reported as
//!   [`ScanError::CorruptSegment`]. Used on segment files, whose alignment is
//!   trusted once they have been written.
//!
//! After either call the scanner sits on the 4-byte length prefix; the frame
//! is then read whole ([`RecordScanner::read_frame`]) or skipped without
//! decoding ([`RecordScanner::skip_payload`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use scanner::{RecordScanner, ScanError};
//!
//! let mut s = RecordScanner::open("bootstrap.dat").unwrap();
//! loop {
//!     match s.next_frame() {
//!         Ok(frame) => println!("frame at {} ({} bytes)", frame.offset, frame.bytes.len()),
//!         Err(ScanError::EndOfInput) => break,
//!         Err(e) => panic!("{}", e),
//!     }
//! }
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;
use wire::{FRAME_PREFIX_BYTES, MAGIC};

/// Largest payload the scanner will buffer (32 MiB). Larger length prefixes
/// are treated as corruption rather than allocated.
pub const DEFAULT_MAX_RECORD_BYTES: u32 = 32 * 1024 * 1024;

/// Errors that can occur while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The stream ended cleanly on a record boundary (or, in tolerant mode,
    /// before another magic was found).
    #[error("end of input")]
    EndOfInput,

    /// The stream ended inside a frame.
    #[error("truncated record at offset {offset}: needed {needed} more bytes")]
    TruncatedInput {
        /// Offset of the frame's magic.
        offset: u64,
        /// Bytes still missing.
        needed: u64,
    },

    /// Strict mode only: the bytes at a record boundary are not the magic.
    #[error("corrupt segment: expected magic at offset {offset}, found {found:02x?}")]
    CorruptSegment { offset: u64, found: Vec<u8> },

    /// The length prefix exceeds the configured maximum.
    #[error("record at offset {offset} declares {len} bytes (max {max})")]
    RecordTooLarge { offset: u64, len: u32, max: u32 },

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One raw frame, copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream offset of the frame's first magic byte.
    pub offset: u64,
    /// Bytes discarded before the magic was found (always 0 in strict mode).
    pub skipped: u64,
    /// Magic, length prefix and payload.
    pub bytes: Vec<u8>,
}

impl Frame {
    /// The declared payload length.
    #[must_use]
    pub fn payload_len(&self) -> u32 {
        u32::from_le_bytes([self.bytes[4], self.bytes[5], self.bytes[6], self.bytes[7]])
    }

    /// Everything after the length prefix.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[FRAME_PREFIX_BYTES..]
    }
}

/// Sequential frame reader over any `Read` implementor.
///
/// Tracks the absolute stream offset of everything it consumes so errors can
/// point at the failing byte.
pub struct RecordScanner<R: Read> {
    rdr: BufReader<R>,
    magic: [u8; 4],
    max_record_bytes: u32,
    /// Bytes consumed from the start of the stream.
    offset: u64,
    /// Offset of the magic of the frame currently being read.
    frame_start: u64,
}

impl RecordScanner<File> {
    /// Opens a file for scanning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> RecordScanner<R> {
    /// Wraps `reader` in a buffered scanner using the default magic.
    pub fn new(reader: R) -> Self {
        Self {
            rdr: BufReader::new(reader),
            magic: MAGIC,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            offset: 0,
            frame_start: 0,
        }
    }

    /// Replaces the main-network magic.
    #[must_use]
    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Cap on a single payload; see [`ScanError::RecordTooLarge`].
    #[must_use]
    pub fn with_max_record_bytes(mut self, max: u32) -> Self {
        self.max_record_bytes = max;
        self
    }

    #[must_use]
    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    /// Bytes consumed from the start of the stream.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Advances byte by byte until the magic has been read, returning how many
    /// bytes were discarded before it.
    ///
    /// Every failed candidate position advances the stream by exactly one
    /// byte, so the scan always terminates.
    ///
    /// # Errors
    ///
    /// [`ScanError::EndOfInput`] if the stream is exhausted first, or
    /// [`ScanError::Io`].
    pub fn next_record_start(&mut self) -> Result<u64, ScanError> {
        let mut window = [0u8; 4];
        let mut seen: u64 = 0;
        loop {
            let b = match self.rdr.read_u8() {
                Ok(b) => b,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    if seen > 0 {
                        tracing::debug!(discarded = seen, "no magic before end of input");
                    }
                    return Err(ScanError::EndOfInput);
                }
                Err(e) => return Err(ScanError::Io(e)),
            };
            self.offset += 1;
            seen += 1;
            window.copy_within(1.., 0);
            window[3] = b;

            if seen >= 4 && window == self.magic {
                let skipped = seen - 4;
                self.frame_start = self.offset - 4;
                if skipped > 0 {
                    tracing::debug!(skipped, offset = self.frame_start, "resynchronized on magic");
                }
                return Ok(skipped);
            }
        }
    }

    /// Reads the next four bytes and requires them to be the magic.
    ///
    /// # Errors
    ///
    /// - [`ScanError::EndOfInput`] if the stream ends exactly here.
    /// - [`ScanError::TruncatedInput`] if it ends after 1 to 3 bytes.
    /// - [`ScanError::CorruptSegment`] if the bytes are not the magic.
    pub fn expect_record_start(&mut self) -> Result<(), ScanError> {
        let start = self.offset;
        let mut found = [0u8; 4];
        let n = self.read_up_to(&mut found)?;
        if n == 0 {
            return Err(ScanError::EndOfInput);
        }
        if n < found.len() {
            return Err(ScanError::TruncatedInput {
                offset: start,
                needed: (found.len() - n) as u64,
            });
        }
        if found != self.magic {
            return Err(ScanError::CorruptSegment {
                offset: start,
                found: found.to_vec(),
            });
        }
        self.frame_start = start;
        Ok(())
    }

    /// Reads the little-endian length prefix that follows the magic.
    ///
    /// # Errors
    ///
    /// [`ScanError::TruncatedInput`] if the prefix is cut short, or
    /// [`ScanError::RecordTooLarge`] if it exceeds the configured maximum.
    pub fn read_payload_len(&mut self) -> Result<u32, ScanError> {
        let mut prefix = [0u8; 4];
        let n = self.read_up_to(&mut prefix)?;
        if n < prefix.len() {
            return Err(ScanError::TruncatedInput {
                offset: self.frame_start,
                needed: (prefix.len() - n) as u64,
            });
        }
        let len = LittleEndian::read_u32(&prefix);
        if len > self.max_record_bytes {
            return Err(ScanError::RecordTooLarge {
                offset: self.frame_start,
                len,
                max: self.max_record_bytes,
            });
        }
        Ok(len)
    }

    /// Reads a `len`-byte payload and returns the whole frame
    /// (magic + prefix + payload).
    pub fn read_frame(&mut self, len: u32, skipped: u64) -> Result<Frame, ScanError> {
        let mut bytes = Vec::with_capacity(FRAME_PREFIX_BYTES + len as usize);
        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.resize(FRAME_PREFIX_BYTES + len as usize, 0);

        let n = self.read_up_to(&mut bytes[FRAME_PREFIX_BYTES..])?;
        if n < len as usize {
            return Err(ScanError::TruncatedInput {
                offset: self.frame_start,
                needed: (len as usize - n) as u64,
            });
        }
        Ok(Frame {
            offset: self.frame_start,
            skipped,
            bytes,
        })
    }

    /// Consumes a `len`-byte payload without buffering it.
    pub fn skip_payload(&mut self, len: u32) -> Result<(), ScanError> {
        let copied = io::copy(&mut (&mut self.rdr).take(len as u64), &mut io::sink())?;
        self.offset += copied;
        if copied < len as u64 {
            return Err(ScanError::TruncatedInput {
                offset: self.frame_start,
                needed: len as u64 - copied,
            });
        }
        Ok(())
    }

    /// Tolerant: resynchronizes on the next magic and reads that frame.
    pub fn next_frame(&mut self) -> Result<Frame, ScanError> {
        let skipped = self.next_record_start()?;
        let len = self.read_payload_len()?;
        self.read_frame(len, skipped)
    }

    /// Strict: the next bytes must be a complete frame.
    pub fn next_frame_strict(&mut self) -> Result<Frame, ScanError> {
        self.expect_record_start()?;
        let len = self.read_payload_len()?;
        self.read_frame(len, 0)
    }

    /// Strict: skips the next frame via its length prefix, without decoding,
    /// and returns the offset it started at.
    pub fn skip_frame_strict(&mut self) -> Result<u64, ScanError> {
        self.expect_record_start()?;
        let len = self.read_payload_len()?;
        self.skip_payload(len)?;
        Ok(self.frame_start)
    }

    /// Reads until `buf` is full or the stream ends, returning the count read.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize, ScanError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.rdr.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScanError::Io(e)),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

impl<R: Read + Seek> RecordScanner<R> {
    /// Moves back to the start of the stream.
    pub fn rewind(&mut self) -> Result<(), ScanError> {
        self.rdr.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.frame_start = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
