//! Directory-backed range index.
//!
//! The segment directory listing is the index: every file whose name parses
//! as a [`SegmentName`] is a segment. The listing is read once into a map
//! keyed by floor height and only re-read on [`SegmentIndex::refresh`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scanner::DEFAULT_MAX_RECORD_BYTES;
use wire::MAGIC;

use crate::{Lookup, SegmentError, SegmentName};

/// A segment file and the range its name claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub name: SegmentName,
    pub path: PathBuf,
}

impl SegmentRef {
    #[must_use]
    pub fn floor(&self) -> u64 {
        self.name.floor
    }

    /// Height of the last record in the file.
    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.name.effective_ceiling()
    }

    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.name.is_latest()
    }
}

/// Sorted view of a segment directory.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    dir: PathBuf,
    segments: BTreeMap<u64, SegmentRef>,
    magic: [u8; 4],
    max_record_bytes: u32,
}

impl SegmentIndex {
    /// Lists `dir`. A missing directory yields an empty index.
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidName`] for a file that looks like a segment but
    /// does not parse, [`SegmentError::Overlap`] if two segments claim the
    /// same height, or [`SegmentError::Io`].
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SegmentError> {
        let dir = dir.as_ref().to_path_buf();
        let segments = list_segments(&dir)?;
        tracing::debug!(dir = %dir.display(), segments = segments.len(), "segment index loaded");
        Ok(Self {
            dir,
            segments,
            magic: MAGIC,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        })
    }

    /// Frame magic used by cursors opened over this index.
    #[must_use]
    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Largest payload cursors will read before reporting corruption.
    #[must_use]
    pub fn with_max_record_bytes(mut self, max: u32) -> Self {
        self.max_record_bytes = max;
        self
    }

    /// Re-lists the directory, picking up segments written since `open`.
    pub fn refresh(&mut self) -> Result<(), SegmentError> {
        self.segments = list_segments(&self.dir)?;
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    #[must_use]
    pub fn max_record_bytes(&self) -> u32 {
        self.max_record_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in height order.
    pub fn iter(&self) -> impl Iterator<Item = &SegmentRef> {
        self.segments.values()
    }

    #[must_use]
    pub fn first(&self) -> Option<&SegmentRef> {
        self.segments.values().next()
    }

    #[must_use]
    pub fn last(&self) -> Option<&SegmentRef> {
        self.segments.values().next_back()
    }

    /// The latest segment, if chunking has completed at least once.
    #[must_use]
    pub fn latest(&self) -> Option<&SegmentRef> {
        self.segments.values().find(|s| s.is_latest())
    }

    /// Height of the last chunked record, or 0 for an empty index.
    #[must_use]
    pub fn tip_height(&self) -> u64 {
        self.last().map_or(0, SegmentRef::ceiling)
    }

    /// The segment with `floor <= height <= ceiling`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NotFound`] if no segment covers `height`.
    pub fn locate(&self, height: u64) -> Result<&SegmentRef, SegmentError> {
        self.segments
            .range(..=height)
            .next_back()
            .map(|(_, seg)| seg)
            .filter(|seg| seg.name.contains(height))
            .ok_or(SegmentError::NotFound(Lookup::Height(height)))
    }

    /// The segment starting right after `ceiling`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NotFound`] at the end of the dataset.
    pub fn next(&self, ceiling: u64) -> Result<&SegmentRef, SegmentError> {
        let floor = ceiling.saturating_add(1);
        self.segments
            .get(&floor)
            .ok_or(SegmentError::NotFound(Lookup::Height(floor)))
    }

    /// The segment ending right before `floor`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::NoPrevious`] at the start of the dataset or when the
    /// preceding range is missing.
    pub fn previous(&self, floor: u64) -> Result<&SegmentRef, SegmentError> {
        let no_previous = SegmentError::NoPrevious { floor };
        if floor <= 1 {
            return Err(no_previous);
        }
        self.segments
            .range(..floor)
            .next_back()
            .map(|(_, seg)| seg)
            .filter(|seg| seg.ceiling() == floor - 1)
            .ok_or(no_previous)
    }
}

fn list_segments(dir: &Path) -> Result<BTreeMap<u64, SegmentRef>, SegmentError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut segments = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !SegmentName::looks_like_segment(file_name) {
            continue;
        }
        let name = SegmentName::parse(file_name)?;
        let seg = SegmentRef {
            name,
            path: entry.path(),
        };
        if let Some(existing) = segments.insert(name.floor, seg) {
            return Err(SegmentError::Overlap {
                first: existing.name.file_name(),
                second: name.file_name(),
            });
        }
    }

    let mut prev: Option<&SegmentRef> = None;
    for seg in segments.values() {
        if let Some(p) = prev {
            if p.name.ceiling >= seg.floor() {
                return Err(SegmentError::Overlap {
                    first: p.name.file_name(),
                    second: seg.name.file_name(),
                });
            }
        }
        prev = Some(seg);
    }

    Ok(segments)
}
