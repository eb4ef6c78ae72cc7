//! # Manifest - Segment Checksums
//!
//! Written by the chunker next to the segments it produced, one line per
//! segment:
//!
//! ```text
//! # blockseg segment manifest
//! # Format: <filename>:<records>:<crc32>
//! 1_100.dat:100:8f3a61c2
//! 101_200.dat.150.current:50:0c9e2d17
//! ```
//!
//! Lines starting with `#` are comments. Empty lines are ignored. The file is
//! rewritten atomically through `MANIFEST.tmp` and a rename.
//!
//! The manifest only records checksums. Lookups still go through the
//! directory listing in [`crate::SegmentIndex`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::SegmentError;

/// Name of the manifest file within the segment directory.
pub const MANIFEST_FILENAME: &str = "MANIFEST";

/// Temporary file used during atomic manifest writes.
pub const MANIFEST_TMP_FILENAME: &str = "MANIFEST.tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Segment file name (not a path).
    pub filename: String,
    pub records: u64,
    /// CRC32 over the whole segment file.
    pub crc32: u32,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    /// Entries in the order they were written.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Loads `dir/MANIFEST`, or starts an empty one if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidManifest`] if a line does not parse.
    pub fn load_or_create(dir: &Path) -> Result<Self, SegmentError> {
        let path = dir.join(MANIFEST_FILENAME);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    entries: Vec::new(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            entries.push(parse_line(i + 1, trimmed)?);
        }
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds an entry (does **not** save to disk).
    pub fn add(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Persists the manifest: write `MANIFEST.tmp`, fsync, rename.
    pub fn save(&self) -> Result<(), SegmentError> {
        let tmp_path = self.path.with_file_name(MANIFEST_TMP_FILENAME);
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            writeln!(f, "# blockseg segment manifest")?;
            writeln!(f, "# Format: <filename>:<records>:<crc32>")?;
            for e in &self.entries {
                writeln!(f, "{}:{}:{:08x}", e.filename, e.records, e.crc32)?;
            }
            f.flush()?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Recomputes the checksum of every listed segment.
    ///
    /// # Errors
    ///
    /// [`SegmentError::ChecksumMismatch`] on the first segment whose bytes
    /// changed, or [`SegmentError::Io`] if one is missing.
    pub fn verify(&self) -> Result<(), SegmentError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        for entry in &self.entries {
            let actual = checksum_file(&dir.join(&entry.filename))?;
            if actual != entry.crc32 {
                return Err(SegmentError::ChecksumMismatch {
                    filename: entry.filename.clone(),
                    expected: entry.crc32,
                    actual,
                });
            }
        }
        tracing::debug!(segments = self.entries.len(), "manifest verified");
        Ok(())
    }
}

/// CRC32 of a whole file.
pub fn checksum_file(path: &Path) -> Result<u32, SegmentError> {
    let mut f = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn parse_line(line: usize, text: &str) -> Result<ManifestEntry, SegmentError> {
    let invalid = |reason: &str| SegmentError::InvalidManifest {
        line,
        reason: format!("{}: {}", reason, text),
    };

    let mut parts = text.rsplitn(3, ':');
    let crc = parts.next().ok_or_else(|| invalid("missing checksum"))?;
    let records = parts.next().ok_or_else(|| invalid("missing record count"))?;
    let filename = parts.next().ok_or_else(|| invalid("missing file name"))?;

    let crc32 = u32::from_str_radix(crc, 16).map_err(|_| invalid("bad checksum"))?;
    let records = records.parse().map_err(|_| invalid("bad record count"))?;
    if filename.is_empty() {
        return Err(invalid("empty file name"));
    }

    Ok(ManifestEntry {
        filename: filename.to_string(),
        records,
        crc32,
    })
}
