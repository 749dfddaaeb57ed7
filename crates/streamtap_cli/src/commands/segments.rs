//! Segments command implementation.

use serde::Serialize;
use std::path::Path;
use streamtap_core::{FileSegmentStore, SegmentInfo, SegmentStore};

/// One listed segment.
#[derive(Debug, Serialize)]
pub struct SegmentEntry {
    /// File name of the segment.
    pub file_name: String,
    /// Sequence number.
    pub sequence: u64,
    /// Creation time encoded in the name (local time).
    pub created: String,
    /// Size in bytes.
    pub size: u64,
}

/// Listing of a segment directory.
#[derive(Debug, Serialize)]
pub struct SegmentListing {
    /// Segment directory.
    pub path: String,
    /// Segments in sequence order.
    pub segments: Vec<SegmentEntry>,
    /// Total size in bytes.
    pub total_size: u64,
}

impl SegmentListing {
    fn new(path: &Path, infos: Vec<SegmentInfo>) -> Self {
        let segments: Vec<SegmentEntry> = infos
            .into_iter()
            .map(|info| SegmentEntry {
                file_name: info.name.to_string(),
                sequence: info.name.sequence(),
                created: info.name.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
                size: info.size,
            })
            .collect();
        let total_size = segments.iter().map(|s| s.size).sum();

        Self {
            path: path.display().to_string(),
            segments,
            total_size,
        }
    }
}

/// Runs the segments command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No segment directory at {:?}", path).into());
    }

    let store = FileSegmentStore::new(path);
    let listing = SegmentListing::new(path, store.list()?);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        _ => {
            print_text_output(&listing);
        }
    }

    Ok(())
}

fn print_text_output(listing: &SegmentListing) {
    println!("Segments in {}", listing.path);
    println!();

    if listing.segments.is_empty() {
        println!("  (none)");
        return;
    }

    for segment in &listing.segments {
        println!(
            "  [{:>4}] {}  {}  {}",
            segment.sequence,
            segment.created,
            format_size(segment.size),
            segment.file_name
        );
    }
    println!();
    println!(
        "{} segments, {} total",
        listing.segments.len(),
        format_size(listing.total_size)
    );
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn listing_is_ordered_and_totalled() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data_20240102030405_1.bin"), [0u8; 10]).unwrap();
        std::fs::write(dir.path().join("data_20240102030400_0.bin"), [0u8; 5]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let store = FileSegmentStore::new(dir.path());
        let listing = SegmentListing::new(dir.path(), store.list().unwrap());

        let sequences: Vec<u64> = listing.segments.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(listing.total_size, 15);
        assert_eq!(listing.segments[1].created, "2024-01-02 03:04:05");
        assert_eq!(listing.segments[1].file_name, "data_20240102030405_1.bin");
    }

    #[test]
    fn listing_serializes_to_json() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data_20240102030405_7.bin"), b"abc").unwrap();

        let store = FileSegmentStore::new(dir.path());
        let listing = SegmentListing::new(dir.path(), store.list().unwrap());
        let json: serde_json::Value = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["segments"][0]["sequence"], 7);
        assert_eq!(json["total_size"], 3);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(run(&dir.path().join("missing"), "text").is_err());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
