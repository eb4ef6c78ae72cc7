//! # Parser - Sequential Scan With Parallel Decode
//!
//! Walks a block dump in file order and hands each record to a fixed pool of
//! decode workers.
//!
//! ```text
//!                 sync_channel(queue_depth)
//!  scan thread ──────────────────────────────▶ worker 0 ─┐
//!  (heights in     (height, frame)           ▶ worker 1 ─┼─▶ sink(height, result)
//!   file order)                              ▶ worker N ─┘
//! ```
//!
//! Only the calling thread reads the input, so heights are assigned in strict
//! file order no matter how decoding interleaves. The bounded channel blocks
//! the scanner when the workers fall behind, which caps the number of frames
//! held in memory at `queue_depth + workers`.
//!
//! The sink may be called from any worker and in any order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use parser::{ParseRange, Parser};
//!
//! let parser = Parser::new(4, 16);
//! let summary = parser
//!     .parse_file("bootstrap.dat", ParseRange::new(1000, 10), |height, block| {
//!         if let Ok(block) = block {
//!             println!("{} {}", height, block.hash());
//!         }
//!     })
//!     .unwrap();
//! println!("{:?}", summary);
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use anyhow::{bail, Context, Result};
use config::{Config, ConfigError};
use scanner::{Frame, RecordScanner, ScanError, DEFAULT_MAX_RECORD_BYTES};
use wire::{decode_block_with_magic, Block, DecodeError, MAGIC};

/// Which heights to hand to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRange {
    /// First height dispatched (1-based). Records before it are only counted.
    pub offset: u64,
    /// Records to dispatch; 0 means no limit.
    pub length: u64,
}

impl ParseRange {
    #[must_use]
    pub fn new(offset: u64, length: u64) -> Self {
        Self {
            offset: offset.max(1),
            length,
        }
    }

    /// Every record of the dump.
    #[must_use]
    pub fn all() -> Self {
        Self::new(1, 0)
    }

    fn is_exhausted(&self, dispatched: u64) -> bool {
        self.length != 0 && dispatched >= self.length
    }
}

impl Default for ParseRange {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Records found in the input, dispatched or not.
    pub scanned: u64,
    /// Records sent to the workers.
    pub dispatched: u64,
    /// Dispatched records that decoded cleanly.
    pub decoded: u64,
    /// Dispatched records handed to the sink as a [`DecodeError`].
    pub failed: u64,
    /// Bytes discarded while resynchronizing on the magic.
    pub skipped_bytes: u64,
    /// Frames dropped for an oversized length prefix or a truncated tail.
    pub malformed: u64,
    /// The scan ended early through a [`StopHandle`].
    pub stopped: bool,
}

/// Cancels a running [`Parser::parse`] at the next record boundary.
///
/// A stop issued while no scan is running applies to the next one. The
/// request is cleared when the scan it ended returns.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Parser {
    workers: usize,
    queue_depth: usize,
    magic: [u8; 4],
    max_record_bytes: u32,
    stop: Arc<AtomicBool>,
}

impl Parser {
    /// A parser with `workers` decode threads and room for `queue_depth`
    /// pending frames. Both are raised to at least 1.
    #[must_use]
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_depth: queue_depth.max(1),
            magic: MAGIC,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds a parser from the worker, queue and record size settings.
    ///
    /// # Errors
    ///
    /// Returns the first setting [`Config::validate`] rejects.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::new(cfg.workers, cfg.queue_depth).with_max_record_bytes(cfg.max_record_bytes))
    }

    /// Frames start with `magic` instead of the main-network value.
    #[must_use]
    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Length prefixes above `max` are counted as malformed and skipped.
    #[must_use]
    pub fn with_max_record_bytes(mut self, max: u32) -> Self {
        self.max_record_bytes = max;
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// A handle that stops the running scan, or the next one to start.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Opens `path` and parses the records in `range`.
    pub fn parse_file<P, F>(&self, path: P, range: ParseRange, sink: F) -> Result<ParseSummary>
    where
        P: AsRef<Path>,
        F: Fn(u64, Result<Block, DecodeError>) + Sync,
    {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        self.parse(file, range, sink)
    }

    /// Parses every record of `reader`.
    pub fn parse_all<R, F>(&self, reader: R, sink: F) -> Result<ParseSummary>
    where
        R: Read,
        F: Fn(u64, Result<Block, DecodeError>) + Sync,
    {
        self.parse(reader, ParseRange::all(), sink)
    }

    /// Scans `reader` and decodes the records in `range` on the worker pool.
    ///
    /// Returns once every dispatched record has reached the sink. Garbage
    /// between records is skipped, as is a frame with an oversized length
    /// prefix; a truncated final frame ends the scan. Decode failures go to
    /// the sink and are counted, they do not abort the scan.
    ///
    /// # Errors
    ///
    /// Fails on a read error from `reader`.
    pub fn parse<R, F>(&self, reader: R, range: ParseRange, sink: F) -> Result<ParseSummary>
    where
        R: Read,
        F: Fn(u64, Result<Block, DecodeError>) + Sync,
    {
        let decoded = AtomicU64::new(0);
        let failed = AtomicU64::new(0);
        let magic = self.magic;
        let mut scanner = RecordScanner::new(reader)
            .with_magic(self.magic)
            .with_max_record_bytes(self.max_record_bytes);

        tracing::info!(
            offset = range.offset,
            length = range.length,
            workers = self.workers,
            "parse started"
        );

        let (tx, rx) = mpsc::sync_channel::<(u64, Frame)>(self.queue_depth);
        let rx = Mutex::new(rx);
        let outcome = thread::scope(|scope| -> Result<ParseSummary> {

            for _ in 0..self.workers {
                let rx = &rx;
                let sink = &sink;
                let decoded = &decoded;
                let failed = &failed;
                scope.spawn(move || loop {
                    let job = match rx.lock() {
                        Ok(guard) => guard.recv(),
                        Err(poisoned) => poisoned.into_inner().recv(),
                    };
                    let Ok((height, frame)) = job else {
                        break;
                    };
                    let result = decode_block_with_magic(&frame.bytes, magic).map(|(b, _)| b);
                    match &result {
                        Ok(_) => decoded.fetch_add(1, Ordering::Relaxed),
                        Err(e) => {
                            tracing::debug!(height, error = %e, "record failed to decode");
                            failed.fetch_add(1, Ordering::Relaxed)
                        }
                    };
                    sink(height, result);
                });
            }

            let mut summary = ParseSummary::default();
            loop {
                if self.stop.load(Ordering::SeqCst) {
                    summary.stopped = true;
                    tracing::info!(height = summary.scanned, "parse stopped");
                    break;
                }
                if range.is_exhausted(summary.dispatched) {
                    break;
                }

                let frame = match scanner.next_frame() {
                    Ok(frame) => frame,
                    Err(ScanError::EndOfInput) => break,
                    Err(ScanError::RecordTooLarge { offset, len, max }) => {
                        summary.malformed += 1;
                        tracing::warn!(offset, len, max, "oversized record skipped");
                        continue;
                    }
                    Err(ScanError::TruncatedInput { offset, needed }) => {
                        summary.malformed += 1;
                        tracing::warn!(offset, needed, "truncated record at end of input");
                        break;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("read failed after {} records", summary.scanned)
                        })
                    }
                };
                summary.skipped_bytes += frame.skipped;
                summary.scanned += 1;
                let height = summary.scanned;
                if height < range.offset {
                    continue;
                }

                if tx.send((height, frame)).is_err() {
                    bail!("decode workers exited before height {}", height);
                }
                summary.dispatched += 1;
            }
            drop(tx);
            Ok(summary)
        });
        self.stop.store(false, Ordering::SeqCst);
        let mut summary = outcome?;

        summary.decoded = decoded.into_inner();
        summary.failed = failed.into_inner();
        tracing::info!(
            scanned = summary.scanned,
            dispatched = summary.dispatched,
            decoded = summary.decoded,
            failed = summary.failed,
            skipped_bytes = summary.skipped_bytes,
            "parse finished"
        );
        Ok(summary)
    }
}
