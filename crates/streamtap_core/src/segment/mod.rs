//! Segment files.
//!
//! A segment is a flat byte stream: the raw concatenation of every payload
//! appended to it, with no framing and no headers. Segment boundaries carry
//! no in-band marker.
//!
//! ## Naming
//!
//! ```text
//! data_<YYYYMMDDHHMMSS>_<sequence>.bin
//! ```
//!
//! The timestamp is the local time at which the segment was opened. The
//! sequence number is unique and strictly increasing within an output
//! directory.

mod store;
mod writer;

pub use store::{FileSegmentStore, InMemorySegmentStore, SegmentStore};
pub use writer::{ClosedSegment, SegmentWriter};

use chrono::{Local, NaiveDateTime, Timelike};
use std::fmt;
use std::path::PathBuf;

/// File name prefix shared by all segments.
pub const SEGMENT_PREFIX: &str = "data_";

/// File extension shared by all segments.
pub const SEGMENT_EXTENSION: &str = "bin";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Older recorders separated date and time with an underscore.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The identity of a segment: when it was opened and its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentName {
    timestamp: NaiveDateTime,
    sequence: u64,
}

impl SegmentName {
    /// Creates a segment name. Sub-second precision is discarded.
    pub fn new(timestamp: NaiveDateTime, sequence: u64) -> Self {
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            sequence,
        }
    }

    /// Creates a segment name stamped with the current local time.
    pub fn now(sequence: u64) -> Self {
        Self::new(Local::now().naive_local(), sequence)
    }

    /// Returns the sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the opening timestamp.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Parses a segment file name.
    ///
    /// Returns `None` for anything that is not a segment file.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix(SEGMENT_PREFIX)?
            .strip_suffix(SEGMENT_EXTENSION)?
            .strip_suffix('.')?;
        let (timestamp, sequence) = stem.rsplit_once('_')?;

        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let sequence = sequence.parse().ok()?;

        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(timestamp, LEGACY_TIMESTAMP_FORMAT))
            .ok()?;

        Some(Self::new(timestamp, sequence))
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}_{}.{}",
            SEGMENT_PREFIX,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.sequence,
            SEGMENT_EXTENSION
        )
    }
}

/// A segment found in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Parsed segment name.
    pub name: SegmentName,
    /// Size of the segment in bytes.
    pub size: u64,
    /// Location on disk, if the store is file-backed.
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn name_format() {
        let name = SegmentName::new(at(7, 5, 3), 42);
        assert_eq!(name.to_string(), "data_20240309070503_42.bin");
    }

    #[test]
    fn name_parse() {
        let name = SegmentName::parse("data_20240309070503_42.bin").unwrap();
        assert_eq!(name.sequence(), 42);
        assert_eq!(name.timestamp(), at(7, 5, 3));
    }

    #[test]
    fn name_parse_legacy_format() {
        let name = SegmentName::parse("data_20240309_070503_7.bin").unwrap();
        assert_eq!(name.sequence(), 7);
        assert_eq!(name.timestamp(), at(7, 5, 3));
    }

    #[test]
    fn name_parse_rejects_foreign_files() {
        assert!(SegmentName::parse("notes.txt").is_none());
        assert!(SegmentName::parse("data_20240309070503_42.log").is_none());
        assert!(SegmentName::parse("data_20240309070503_.bin").is_none());
        assert!(SegmentName::parse("data_garbage_1.bin").is_none());
        assert!(SegmentName::parse("data_20240309070503_-1.bin").is_none());
    }

    #[test]
    fn subsecond_precision_dropped() {
        let precise = at(1, 2, 3).with_nanosecond(123_456_789).unwrap();
        let name = SegmentName::new(precise, 0);
        assert_eq!(SegmentName::parse(&name.to_string()).unwrap(), name);
    }
}
