//! Segment file names.
//!
//! ```text
//! 1_10000.dat                     sealed, holds heights 1..=10000
//! 10001_20000.dat.current         latest, full
//! 20001_30000.dat.24999.current   latest, holds heights 20001..=24999
//! ```

use std::fmt;
use std::str::FromStr;

use crate::SegmentError;

pub const SEGMENT_EXTENSION: &str = "dat";
pub const LATEST_MARKER: &str = "current";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    /// Completed segment holding its full range.
    Sealed,
    /// The last segment written. `last` is the height of its final record
    /// when it stopped short of `ceiling`.
    Latest { last: Option<u64> },
}

/// A parsed segment file name: the height range it claims and whether it is
/// the latest segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentName {
    pub floor: u64,
    pub ceiling: u64,
    pub state: SegmentState,
}

impl SegmentName {
    /// A closed segment holding every height in `floor..=ceiling`.
    #[must_use]
    pub fn sealed(floor: u64, ceiling: u64) -> Self {
        Self {
            floor,
            ceiling,
            state: SegmentState::Sealed,
        }
    }

    /// The latest segment of `[floor, ceiling]` whose final record has
    /// height `last`.
    #[must_use]
    pub fn latest(floor: u64, ceiling: u64, last: u64) -> Self {
        let last = (last < ceiling).then_some(last);
        Self {
            floor,
            ceiling,
            state: SegmentState::Latest { last },
        }
    }

    /// The sealed range of `segment_size` records that contains `height`.
    ///
    /// Heights are 1-based: with a size of 100 the ranges are `[1, 100]`,
    /// `[101, 200]`, and so on. `height` and `segment_size` must be non-zero.
    #[must_use]
    pub fn for_height(height: u64, segment_size: u64) -> Self {
        let floor = (height - 1) / segment_size * segment_size + 1;
        Self::sealed(floor, floor + segment_size - 1)
    }

    #[must_use]
    pub fn is_latest(&self) -> bool {
        matches!(self.state, SegmentState::Latest { .. })
    }

    /// Height of the last record the segment actually holds.
    #[must_use]
    pub fn effective_ceiling(&self) -> u64 {
        match self.state {
            SegmentState::Latest { last: Some(last) } => last,
            _ => self.ceiling,
        }
    }

    #[must_use]
    pub fn contains(&self, height: u64) -> bool {
        self.floor <= height && height <= self.effective_ceiling()
    }

    /// Number of records the segment holds.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.effective_ceiling() - self.floor + 1
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        match self.state {
            SegmentState::Sealed => {
                format!("{}_{}.{}", self.floor, self.ceiling, SEGMENT_EXTENSION)
            }
            SegmentState::Latest { last: None } => format!(
                "{}_{}.{}.{}",
                self.floor, self.ceiling, SEGMENT_EXTENSION, LATEST_MARKER
            ),
            SegmentState::Latest { last: Some(last) } => format!(
                "{}_{}.{}.{}.{}",
                self.floor, self.ceiling, SEGMENT_EXTENSION, last, LATEST_MARKER
            ),
        }
    }

    /// Whether `name` has the shape of a segment file name, valid or not.
    #[must_use]
    pub fn looks_like_segment(name: &str) -> bool {
        name.ends_with(&format!(".{}", SEGMENT_EXTENSION))
            || name.ends_with(&format!(".{}", LATEST_MARKER))
    }

    /// Parses a file name (not a path).
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidName`] unless the name is one of the three
    /// shapes above with `1 <= floor <= last <= ceiling`.
    pub fn parse(name: &str) -> Result<Self, SegmentError> {
        let invalid = || SegmentError::InvalidName(name.to_string());

        let parts: Vec<&str> = name.split('.').collect();
        let (range, state) = match parts.as_slice() {
            [range, ext] if *ext == SEGMENT_EXTENSION => (*range, SegmentState::Sealed),
            [range, ext, marker] if *ext == SEGMENT_EXTENSION && *marker == LATEST_MARKER => {
                (*range, SegmentState::Latest { last: None })
            }
            [range, ext, last, marker] if *ext == SEGMENT_EXTENSION && *marker == LATEST_MARKER => {
                let last = parse_height(last).ok_or_else(invalid)?;
                (*range, SegmentState::Latest { last: Some(last) })
            }
            _ => return Err(invalid()),
        };

        let (floor, ceiling) = range.split_once('_').ok_or_else(invalid)?;
        let floor = parse_height(floor).ok_or_else(invalid)?;
        let ceiling = parse_height(ceiling).ok_or_else(invalid)?;
        if floor == 0 || floor > ceiling {
            return Err(invalid());
        }
        if let SegmentState::Latest { last: Some(last) } = state {
            if last < floor || last > ceiling {
                return Err(invalid());
            }
        }

        Ok(Self {
            floor,
            ceiling,
            state,
        })
    }
}

/// Plain decimal digits only; no sign, no whitespace.
fn parse_height(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for SegmentName {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
