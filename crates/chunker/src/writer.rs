use crc32fast::Hasher as Crc32;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use segment::{ManifestEntry, SegmentName};

/// Suffix of a segment that is still being written.
pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// One segment being filled.
///
/// Frames go to `<floor>_<ceiling>.dat.tmp`. [`SegmentWriter::finish`]
/// fsyncs the file and renames it to its final name, so a readable segment
/// name never points at a partially written file.
pub(crate) struct SegmentWriter {
    range: SegmentName,
    tmp_path: PathBuf,
    file: BufWriter<File>,
    crc: Crc32,
    records: u64,
}

impl SegmentWriter {
    pub(crate) fn create(dir: &Path, range: SegmentName) -> io::Result<Self> {
        let tmp_path = dir.join(format!("{}{}", range.file_name(), TMP_SUFFIX));
        let raw = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        Ok(Self {
            range,
            tmp_path,
            file: BufWriter::new(raw),
            crc: Crc32::new(),
            records: 0,
        })
    }

    pub(crate) fn range(&self) -> SegmentName {
        self.range
    }

    pub(crate) fn records(&self) -> u64 {
        self.records
    }

    /// Height of the last record appended.
    pub(crate) fn last_height(&self) -> u64 {
        self.range.floor + self.records - 1
    }

    /// Appends one frame verbatim.
    pub(crate) fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.crc.update(frame);
        self.records += 1;
        Ok(())
    }

    /// Flushes, fsyncs and renames the segment to `name`.
    pub(crate) fn finish(self, name: SegmentName) -> io::Result<ManifestEntry> {
        let Self {
            tmp_path,
            file,
            crc,
            records,
            ..
        } = self;

        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let path = tmp_path.with_file_name(name.file_name());
        fs::rename(&tmp_path, &path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        tracing::info!(segment = %name, records, "segment written");
        Ok(ManifestEntry {
            filename: name.file_name(),
            records,
            crc32: crc.finalize(),
        })
    }
}
