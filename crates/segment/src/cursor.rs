//! # Cursor - Seeking Inside Segments
//!
//! A [`SegmentCursor`] is a read position inside one segment file. It knows
//! the height range the file's name claims and the height of the next record
//! it will read.
//!
//! Segment files are trusted to be aligned: every record boundary must carry
//! the magic. Anything else is reported as [`SegmentError::CorruptSegment`]
//! rather than skipped.
//!
//! Height seeks count frames through their length prefixes and only decode
//! the target record. Hash seeks decode every record from the current
//! position to the end of the segment and never cross into the next one;
//! callers chain [`SegmentCursor::next`] for that.

use std::fs::File;

use scanner::{Frame, RecordScanner, ScanError};
use wire::{decode_block_with_magic, Block, Hash256, Transaction};

use crate::{Lookup, SegmentError, SegmentIndex, SegmentRef};

/// A transaction found by [`SegmentCursor::seek_by_hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMatch {
    /// Height of the enclosing block.
    pub height: u64,
    /// Position of the transaction within its block.
    pub index: usize,
    pub block_hash: Hash256,
    pub transaction: Transaction,
}

pub struct SegmentCursor<'a> {
    index: &'a SegmentIndex,
    segment: SegmentRef,
    scanner: RecordScanner<File>,
    /// Height of the record the scanner is positioned in front of.
    next_height: u64,
}

impl<'a> SegmentCursor<'a> {
    /// Opens `segment` positioned at its first record.
    pub fn open(index: &'a SegmentIndex, segment: &SegmentRef) -> Result<Self, SegmentError> {
        let scanner = RecordScanner::open(&segment.path)
            .map_err(|e| SegmentError::from_scan(&segment.path, e))?
            .with_magic(index.magic())
            .with_max_record_bytes(index.max_record_bytes());
        tracing::debug!(segment = %segment.name, "opened segment");
        Ok(Self {
            index,
            segment: segment.clone(),
            scanner,
            next_height: segment.floor(),
        })
    }

    /// Opens the first segment of the index.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NotFound`] on an empty index.
    pub fn first(index: &'a SegmentIndex) -> Result<Self, SegmentError> {
        let segment = index
            .first()
            .ok_or(SegmentError::NotFound(Lookup::Height(1)))?;
        Self::open(index, segment)
    }

    /// Opens the segment covering `height`, positioned at its first record.
    pub fn at_height(index: &'a SegmentIndex, height: u64) -> Result<Self, SegmentError> {
        let segment = index.locate(height)?;
        Self::open(index, segment)
    }

    #[must_use]
    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    #[must_use]
    pub fn floor(&self) -> u64 {
        self.segment.floor()
    }

    /// Height of the last record in the segment.
    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.segment.ceiling()
    }

    /// Height of the record the next read returns.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next_height
    }

    /// Byte offset within the segment file.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.scanner.offset()
    }

    /// Moves back to the first record of the segment.
    pub fn rewind(&mut self) -> Result<(), SegmentError> {
        self.scanner
            .rewind()
            .map_err(|e| SegmentError::from_scan(&self.segment.path, e))?;
        self.next_height = self.floor();
        Ok(())
    }

    /// Decodes the record at the current position and advances past it.
    ///
    /// Returns `Ok(None)` once every record of the segment has been read.
    ///
    /// # Errors
    ///
    /// [`SegmentError::CorruptSegment`] if the file holds fewer or more
    /// records than its name claims, or a frame is misaligned or torn.
    /// [`SegmentError::Decode`] if a frame is well-framed but malformed.
    pub fn read_next(&mut self) -> Result<Option<(u64, Block)>, SegmentError> {
        let offset = self.scanner.offset();
        let Some(frame) = self.next_frame()? else {
            if self.next_height <= self.ceiling() {
                return Err(self.corrupt(
                    offset,
                    format!(
                        "segment ends at height {}, name claims {}",
                        self.next_height - 1,
                        self.ceiling()
                    ),
                ));
            }
            return Ok(None);
        };
        if self.next_height > self.ceiling() {
            return Err(self.corrupt(
                frame.offset,
                format!("record past the claimed ceiling {}", self.ceiling()),
            ));
        }
        // The frame is consumed whether or not it decodes.
        let height = self.next_height;
        self.next_height += 1;
        let block = self.decode(height, &frame)?;
        Ok(Some((height, block)))
    }

    /// Returns the record at `height`, switching to the segment that covers
    /// it when needed.
    ///
    /// Records before the target are skipped through their length prefixes
    /// without being decoded.
    ///
    /// # Errors
    ///
    /// [`SegmentError::OutOfRange`] for height 0, a height past the last
    /// chunked record, or a segment that ends before reaching `height`.
    pub fn seek_by_height(&mut self, height: u64) -> Result<Block, SegmentError> {
        let tip = self.index.tip_height();
        let out_of_range = SegmentError::OutOfRange { height, tip };
        if height == 0 || height > tip {
            return Err(out_of_range);
        }

        if !self.segment.name.contains(height) {
            let target = self.index.locate(height)?.clone();
            tracing::debug!(from = %self.segment.name, to = %target.name, height, "switching segment");
            *self = Self::open(self.index, &target)?;
        }

        if height < self.next_height {
            self.rewind()?;
        }

        while self.next_height < height {
            match self.scanner.skip_frame_strict() {
                Ok(_) => self.next_height += 1,
                Err(ScanError::EndOfInput) => return Err(out_of_range),
                Err(e) => return Err(SegmentError::from_scan(&self.segment.path, e)),
            }
        }

        let Some(frame) = self.next_frame()? else {
            return Err(out_of_range);
        };
        self.next_height += 1;
        self.decode(height, &frame)
    }

    /// Decodes records from the current position until one contains a
    /// transaction hashing to `target`. The cursor is left after that record.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NotFound`] at the end of the segment.
    pub fn seek_by_hash(&mut self, target: &Hash256) -> Result<TxMatch, SegmentError> {
        while let Some((height, mut block)) = self.read_next()? {
            let found = block
                .transactions
                .iter()
                .position(|tx| tx.hash() == *target);
            if let Some(index) = found {
                let block_hash = block.hash();
                let transaction = block.transactions.swap_remove(index);
                return Ok(TxMatch {
                    height,
                    index,
                    block_hash,
                    transaction,
                });
            }
        }
        Err(SegmentError::NotFound(Lookup::Transaction(*target)))
    }

    /// Like [`seek_by_hash`](Self::seek_by_hash), matching block header
    /// hashes instead.
    pub fn seek_by_block_hash(&mut self, target: &Hash256) -> Result<(u64, Block), SegmentError> {
        while let Some((height, block)) = self.read_next()? {
            if block.hash() == *target {
                return Ok((height, block));
            }
        }
        Err(SegmentError::NotFound(Lookup::Block(*target)))
    }

    /// A new cursor at the start of the following segment.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NotFound`] when this is the last segment.
    pub fn next(&self) -> Result<SegmentCursor<'a>, SegmentError> {
        let segment = self.index.next(self.segment.name.ceiling)?;
        Self::open(self.index, segment)
    }

    /// A new cursor at the start of the preceding segment.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NoPrevious`] when this is the first segment.
    pub fn previous(&self) -> Result<SegmentCursor<'a>, SegmentError> {
        let segment = self.index.previous(self.floor())?;
        Self::open(self.index, segment)
    }

    /// Strict read of the next frame; `None` on a clean end of file.
    fn next_frame(&mut self) -> Result<Option<Frame>, SegmentError> {
        match self.scanner.next_frame_strict() {
            Ok(frame) => Ok(Some(frame)),
            Err(ScanError::EndOfInput) => Ok(None),
            Err(e) => Err(SegmentError::from_scan(&self.segment.path, e)),
        }
    }

    fn decode(&self, height: u64, frame: &Frame) -> Result<Block, SegmentError> {
        decode_block_with_magic(&frame.bytes, self.index.magic())
            .map(|(block, _)| block)
            .map_err(|source| SegmentError::Decode {
                path: self.segment.path.clone(),
                height,
                source,
            })
    }

    fn corrupt(&self, offset: u64, reason: String) -> SegmentError {
        SegmentError::CorruptSegment {
            path: self.segment.path.clone(),
            offset,
            reason,
        }
    }
}
