//! # Chunker - Dump Segmentation
//!
//! Rewrites a monolithic block dump into height-indexed segment files.
//!
//! The dump is read once, front to back. Frames are located with the tolerant
//! scanner and copied verbatim (magic, length prefix and payload, no decode)
//! into the open segment. Every `segment_size` records a new segment starts:
//!
//! ```text
//! dump:  [garbage][rec 1][rec 2] ... [rec 250]
//!
//! 1_100.dat                   records 1..=100
//! 101_200.dat                 records 101..=200
//! 201_300.dat.250.current     records 201..=250 (latest)
//! MANIFEST                    record count and CRC32 per segment
//! ```
//!
//! ## Failure Semantics
//!
//! - Unrecognized bytes between frames are skipped and logged; the scanner
//!   resynchronizes on the next magic.
//! - A length prefix above the configured maximum is logged and skipped.
//! - A frame cut off by the end of the input is logged and dropped.
//! - Any I/O error is fatal and reported with the number of records already
//!   written ([`ChunkError::Io`]).
//!
//! ## Resume
//!
//! A directory that already holds a latest segment is considered chunked and
//! left untouched unless `rechunk` is set. Otherwise every segment, temp file
//! and manifest in the directory is removed before writing, so a run never
//! mixes its output with an earlier one.

mod writer;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError};
use scanner::{RecordScanner, ScanError, DEFAULT_MAX_RECORD_BYTES};
use segment::{
    Manifest, SegmentError, SegmentIndex, SegmentName, MANIFEST_FILENAME, MANIFEST_TMP_FILENAME,
};
use thiserror::Error;
use wire::MAGIC;

use crate::writer::{SegmentWriter, TMP_SUFFIX};

#[derive(Debug, Error)]
pub enum ChunkError {
    /// Fatal I/O failure. `written` records made it into segments first.
    #[error("io error after {written} records: {source}")]
    Io {
        written: u64,
        #[source]
        source: io::Error,
    },

    #[error("segment directory: {0}")]
    Segment(#[from] SegmentError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Outcome of a [`Chunker::chunk`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Records copied into segments (the tip height).
    pub written: u64,
    /// Segment files in the directory after the run.
    pub segments: usize,
    /// Bytes discarded while resynchronizing on the magic.
    pub skipped_bytes: u64,
    /// Frames dropped for an oversized length prefix or a truncated tail.
    pub malformed: u64,
    /// The directory was already chunked and nothing was written.
    pub resumed: bool,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    dir: PathBuf,
    segment_size: u64,
    rechunk: bool,
    magic: [u8; 4],
    max_record_bytes: u32,
}

impl Chunker {
    /// A chunker writing `segment_size` records per file into `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, segment_size: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            segment_size,
            rechunk: false,
            magic: MAGIC,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// # Errors
    ///
    /// Returns the first setting [`Config::validate`] rejects.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::new(&cfg.chunk_dir, cfg.segment_size)
            .rechunk(cfg.rechunk)
            .with_max_record_bytes(cfg.max_record_bytes))
    }

    /// Regenerate the directory even if it is already chunked.
    #[must_use]
    pub fn rechunk(mut self, rechunk: bool) -> Self {
        self.rechunk = rechunk;
        self
    }

    /// Frame magic to resynchronize on.
    #[must_use]
    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Length prefixes above `max` are dropped as malformed.
    #[must_use]
    pub fn with_max_record_bytes(mut self, max: u32) -> Self {
        self.max_record_bytes = max;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Opens `path` and chunks it.
    pub fn chunk_file<P: AsRef<Path>>(&self, path: P) -> Result<ChunkReport, ChunkError> {
        let file = File::open(path.as_ref()).map_err(|source| ChunkError::Io { written: 0, source })?;
        self.chunk(file)
    }

    /// Splits `reader` into segments.
    ///
    /// # Errors
    ///
    /// [`ChunkError::Io`] on any read or write failure,
    /// [`ChunkError::Segment`] if an existing directory cannot be listed or
    /// the manifest cannot be written, [`ChunkError::Config`] for a zero
    /// segment size.
    pub fn chunk<R: Read>(&self, reader: R) -> Result<ChunkReport, ChunkError> {
        if self.segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize.into());
        }
        fs::create_dir_all(&self.dir).map_err(|source| ChunkError::Io { written: 0, source })?;

        if !self.rechunk {
            let index = SegmentIndex::open(&self.dir)?;
            if let Some(latest) = index.latest() {
                tracing::info!(
                    dir = %self.dir.display(),
                    latest = %latest.name,
                    "segments already present, skipping"
                );
                return Ok(ChunkReport {
                    written: latest.ceiling(),
                    segments: index.len(),
                    resumed: true,
                    ..ChunkReport::default()
                });
            }
        }

        let removed = self
            .clear_dir()
            .map_err(|source| ChunkError::Io { written: 0, source })?;
        if removed > 0 {
            tracing::info!(dir = %self.dir.display(), removed, "cleared segment directory");
        }

        let mut report = ChunkReport::default();
        let mut manifest = Manifest::load_or_create(&self.dir)?;
        let mut scanner = RecordScanner::new(reader)
            .with_magic(self.magic)
            .with_max_record_bytes(self.max_record_bytes);
        let mut open: Option<SegmentWriter> = None;

        loop {
            let skipped = match scanner.next_record_start() {
                Ok(n) => n,
                Err(ScanError::EndOfInput) => break,
                Err(e) => return Err(fatal(report.written, e)),
            };
            if skipped > 0 {
                report.skipped_bytes += skipped;
                tracing::warn!(
                    skipped,
                    offset = scanner.offset() - 4,
                    "skipped unrecognized bytes before record"
                );
            }

            let frame = match scanner
                .read_payload_len()
                .and_then(|len| scanner.read_frame(len, skipped))
            {
                Ok(frame) => frame,
                Err(ScanError::RecordTooLarge { offset, len, max }) => {
                    report.malformed += 1;
                    tracing::warn!(offset, len, max, "oversized record skipped");
                    continue;
                }
                Err(ScanError::TruncatedInput { offset, needed }) => {
                    report.malformed += 1;
                    tracing::warn!(offset, needed, "truncated record at end of input dropped");
                    break;
                }
                Err(e) => return Err(fatal(report.written, e)),
            };

            let height = report.written + 1;
            let writer = match open.take() {
                Some(w) if w.records() < self.segment_size => w,
                full => {
                    if let Some(w) = full {
                        let range = w.range();
                        let entry = w.finish(range).map_err(|source| ChunkError::Io {
                            written: report.written,
                            source,
                        })?;
                        manifest.add(entry);
                    }
                    let range = SegmentName::for_height(height, self.segment_size);
                    tracing::debug!(segment = %range, "opening segment");
                    SegmentWriter::create(&self.dir, range).map_err(|source| ChunkError::Io {
                        written: report.written,
                        source,
                    })?
                }
            };
            let writer = open.insert(writer);
            writer
                .append(&frame.bytes)
                .map_err(|source| ChunkError::Io {
                    written: report.written,
                    source,
                })?;
            report.written = height;
        }

        if let Some(w) = open {
            let range = w.range();
            let latest = SegmentName::latest(range.floor, range.ceiling, w.last_height());
            let entry = w.finish(latest).map_err(|source| ChunkError::Io {
                written: report.written,
                source,
            })?;
            manifest.add(entry);
        }

        report.segments = manifest.entries.len();
        manifest.save().map_err(|e| match e {
            SegmentError::Io(source) => ChunkError::Io {
                written: report.written,
                source,
            },
            other => ChunkError::Segment(other),
        })?;

        tracing::info!(
            records = report.written,
            segments = report.segments,
            skipped_bytes = report.skipped_bytes,
            malformed = report.malformed,
            "chunking complete"
        );
        Ok(report)
    }

    /// Removes segments, temp files and the manifest. Returns how many files
    /// were deleted.
    fn clear_dir(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let ours = name == MANIFEST_FILENAME
                || name == MANIFEST_TMP_FILENAME
                || name.ends_with(TMP_SUFFIX)
                || SegmentName::looks_like_segment(name);
            if ours {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn fatal(written: u64, err: ScanError) -> ChunkError {
    let source = match err {
        ScanError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    };
    ChunkError::Io { written, source }
}
