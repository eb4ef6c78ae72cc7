//! # Config - Runtime Settings
//!
//! Settings shared by the chunker and the parse driver, read from the
//! environment with defaults:
//!
//! ```text
//! BLOCKSEG_CHUNK_DIR         segment directory          (default: "data/chunks")
//! BLOCKSEG_SEGMENT_SIZE      records per segment        (default: 10000)
//! BLOCKSEG_RECHUNK           rebuild existing segments  (default: "false")
//! BLOCKSEG_WORKERS           decode worker threads      (default: available cores)
//! BLOCKSEG_QUEUE_DEPTH       pending decode jobs        (default: workers * 4)
//! BLOCKSEG_MAX_RECORD_BYTES  largest accepted payload   (default: 33554432)
//! ```
//!
//! Absent or unparsable values fall back to the default.

use std::path::PathBuf;
use std::thread;

use thiserror::Error;

pub use scanner::DEFAULT_MAX_RECORD_BYTES;

pub const DEFAULT_CHUNK_DIR: &str = "data/chunks";
pub const DEFAULT_SEGMENT_SIZE: u64 = 10_000;

/// Pending jobs per worker when the queue depth is not set.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("segment size must be at least 1")]
    ZeroSegmentSize,
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("queue depth must be at least 1")]
    ZeroQueueDepth,
    #[error("max record size must be at least 1 byte")]
    ZeroMaxRecordBytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Flat directory holding the segment files and their manifest.
    pub chunk_dir: PathBuf,
    /// Records per segment file.
    pub segment_size: u64,
    /// Remove and regenerate existing segments instead of treating an
    /// existing latest segment as "already chunked".
    pub rechunk: bool,
    pub workers: usize,
    pub queue_depth: usize,
    pub max_record_bytes: u32,
}

impl Default for Config {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            chunk_dir: PathBuf::from(DEFAULT_CHUNK_DIR),
            segment_size: DEFAULT_SEGMENT_SIZE,
            rechunk: false,
            workers,
            queue_depth: workers * QUEUE_DEPTH_PER_WORKER,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl Config {
    /// Reads the `BLOCKSEG_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let workers = parse_or(&lookup, "BLOCKSEG_WORKERS", defaults.workers);
        Self {
            chunk_dir: lookup("BLOCKSEG_CHUNK_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.chunk_dir),
            segment_size: parse_or(&lookup, "BLOCKSEG_SEGMENT_SIZE", defaults.segment_size),
            rechunk: parse_or(&lookup, "BLOCKSEG_RECHUNK", defaults.rechunk),
            workers,
            queue_depth: parse_or(
                &lookup,
                "BLOCKSEG_QUEUE_DEPTH",
                workers.saturating_mul(QUEUE_DEPTH_PER_WORKER),
            ),
            max_record_bytes: parse_or(
                &lookup,
                "BLOCKSEG_MAX_RECORD_BYTES",
                defaults.max_record_bytes,
            ),
        }
    }

    /// Rejects settings that would make chunking or parsing impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.max_record_bytes == 0 {
            return Err(ConfigError::ZeroMaxRecordBytes);
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
