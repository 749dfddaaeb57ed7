//! Throughput counters and the periodic statistics reporter.
//!
//! The counters form a sampling gauge, not a cumulative total: every report
//! swaps them back to zero. An interval without traffic therefore reports
//! `(0, 0)` and never a stale or negative value.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use streamtap_core::{IngestStats, StatsReporter};
//!
//! let stats = Arc::new(IngestStats::new());
//! stats.record_message(128);
//!
//! let reporter = StatsReporter::new(Arc::clone(&stats));
//! let snapshot = reporter.report();
//! assert_eq!((snapshot.messages, snapshot.bytes), (1, 128));
//! assert_eq!(reporter.report().messages, 0);
//! ```

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const MIB: f64 = 1024.0 * 1024.0;

/// Counters shared between the ingestion loop and the reporter.
///
/// Each counter is updated with a single atomic operation, so no increment
/// is ever lost to a concurrent reset. The recorder samples and ingests on
/// the same task, which keeps a snapshot's message and byte counts
/// consistent with each other.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Messages received since the last report.
    messages: AtomicU64,
    /// Payload bytes received since the last report.
    bytes: AtomicU64,
    /// Size of the active segment (gauge, never reset).
    segment_size: AtomicU64,
}

impl IngestStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a received message of `len` bytes.
    pub fn record_message(&self, len: u64) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
    }

    /// Publishes the size of the active segment.
    pub fn set_segment_size(&self, size: u64) {
        self.segment_size.store(size, Ordering::Relaxed);
    }

    /// Returns the messages received since the last reset.
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Returns the bytes received since the last reset.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Returns the last published active segment size.
    pub fn segment_size(&self) -> u64 {
        self.segment_size.load(Ordering::Relaxed)
    }

    /// Reads and zeroes the message and byte counters.
    ///
    /// Each counter is swapped atomically, but the two swaps are separate.
    /// The pair describes the same set of messages only when this is called
    /// from the task that records them, as the recorder does.
    pub fn take_interval(&self) -> (u64, u64) {
        let messages = self.messages.swap(0, Ordering::AcqRel);
        let bytes = self.bytes.swap(0, Ordering::AcqRel);
        (messages, bytes)
    }
}

/// One reporting interval.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    /// When the interval was sampled.
    pub timestamp: DateTime<Local>,
    /// Messages received during the interval.
    pub messages: u64,
    /// Payload bytes received during the interval.
    pub bytes: u64,
    /// Size of the active segment at sampling time.
    pub segment_size: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Messages: {} | Data: {} Bps | File: {:.2} MB",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.messages,
            self.bytes,
            self.segment_size as f64 / MIB
        )
    }
}

/// Samples and resets the counters once per interval.
#[derive(Debug)]
pub struct StatsReporter {
    stats: Arc<IngestStats>,
    observers: broadcast::Sender<StatsSnapshot>,
}

impl StatsReporter {
    /// Creates a reporter over shared counters.
    pub fn new(stats: Arc<IngestStats>) -> Self {
        let (observers, _) = broadcast::channel(16);
        Self { stats, observers }
    }

    /// Subscribes to every snapshot this reporter emits.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsSnapshot> {
        self.observers.subscribe()
    }

    /// Samples the counters, resets them and logs the interval.
    pub fn report(&self) -> StatsSnapshot {
        let (messages, bytes) = self.stats.take_interval();
        let snapshot = StatsSnapshot {
            timestamp: Local::now(),
            messages,
            bytes,
            segment_size: self.stats.segment_size(),
        };

        info!(
            messages = snapshot.messages,
            bytes = snapshot.bytes,
            segment_size = snapshot.segment_size,
            "{}",
            snapshot
        );
        // No observers is the normal case.
        let _ = self.observers.send(snapshot.clone());

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn interval_then_idle_interval() {
        let stats = Arc::new(IngestStats::new());
        let reporter = StatsReporter::new(Arc::clone(&stats));

        for len in [10, 20, 30] {
            stats.record_message(len);
        }

        let first = reporter.report();
        assert_eq!((first.messages, first.bytes), (3, 60));

        let second = reporter.report();
        assert_eq!((second.messages, second.bytes), (0, 0));
    }

    #[test]
    fn pairs_match_when_taken_on_recording_task() {
        let stats = IngestStats::new();
        for round in 1..=5u64 {
            for _ in 0..round {
                stats.record_message(7);
            }
            assert_eq!(stats.take_interval(), (round, round * 7));
        }
        assert_eq!(stats.take_interval(), (0, 0));
    }

    #[test]
    fn segment_size_is_a_gauge() {
        let stats = Arc::new(IngestStats::new());
        let reporter = StatsReporter::new(Arc::clone(&stats));

        stats.set_segment_size(4096);
        assert_eq!(reporter.report().segment_size, 4096);
        assert_eq!(reporter.report().segment_size, 4096);
    }

    #[test]
    fn observers_receive_snapshots() {
        let stats = Arc::new(IngestStats::new());
        let reporter = StatsReporter::new(Arc::clone(&stats));
        let mut observer = reporter.subscribe();

        stats.record_message(5);
        reporter.report();

        let snapshot = observer.try_recv().unwrap();
        assert_eq!(snapshot.messages, 1);
        assert_eq!(snapshot.bytes, 5);
    }

    #[test]
    fn display_format() {
        let snapshot = StatsSnapshot {
            timestamp: Local::now(),
            messages: 12,
            bytes: 3456,
            segment_size: 3 * 1024 * 1024 / 2,
        };
        let line = snapshot.to_string();
        assert!(line.ends_with("Messages: 12 | Data: 3456 Bps | File: 1.50 MB"));
    }

    #[test]
    fn concurrent_resets_lose_nothing() {
        let stats = Arc::new(IngestStats::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        stats.record_message(3);
                    }
                })
            })
            .collect();

        let mut messages = 0;
        let mut bytes = 0;
        while writers.iter().any(|w| !w.is_finished()) {
            let (m, b) = stats.take_interval();
            messages += m;
            bytes += b;
        }
        for writer in writers {
            writer.join().unwrap();
        }
        let (m, b) = stats.take_interval();
        messages += m;
        bytes += b;

        assert_eq!(messages, 40_000);
        assert_eq!(bytes, 120_000);
    }
}
