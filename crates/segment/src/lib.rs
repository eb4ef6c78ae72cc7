//! # Segment - Height-Indexed Segment Files
//!
//! A chunked dump is a flat directory of segment files, each holding the raw
//! frames of a contiguous run of records. Heights are 1-based and every file
//! name states the range it covers:
//!
//! ```text
//! data/chunks/
//! ├── 1_100.dat
//! ├── 101_200.dat
//! ├── 201_300.dat.250.current     latest segment, heights 201..=250
//! └── MANIFEST                    per-segment checksums
//! ```
//!
//! - [`SegmentName`] parses and formats those names.
//! - [`SegmentIndex`] lists the directory once and answers which file covers
//!   a height, and which files are adjacent.
//! - [`SegmentCursor`] reads one file and seeks by height or by hash.
//! - [`Manifest`] records and verifies a CRC32 per segment.
//!
//! The directory is read-only from this crate's point of view; only the
//! chunker writes to it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use segment::{SegmentCursor, SegmentIndex};
//!
//! let index = SegmentIndex::open("data/chunks").unwrap();
//! let mut cursor = SegmentCursor::at_height(&index, 150).unwrap();
//! let block = cursor.seek_by_height(150).unwrap();
//! println!("{}", block.hash());
//! ```

mod cursor;
mod error;
mod index;
mod manifest;
mod name;

pub use cursor::{SegmentCursor, TxMatch};
pub use error::{Lookup, SegmentError};
pub use index::{SegmentIndex, SegmentRef};
pub use manifest::{checksum_file, Manifest, ManifestEntry, MANIFEST_FILENAME, MANIFEST_TMP_FILENAME};
pub use name::{SegmentName, SegmentState, LATEST_MARKER, SEGMENT_EXTENSION};

#[cfg(test)]
mod tests;
