//! Per-message ingestion.
//!
//! For every received message the [`Ingestor`]:
//! 1. counts it,
//! 2. appends the payload to the active segment,
//! 3. on a failed append, drops the message and forces a rotation,
//! 4. otherwise asks the rotation policy and rotates if due,
//! 5. publishes the active segment size to the statistics gauge.
//!
//! Delivery into storage is at-most-once. A message whose write fails is
//! lost; it is never retried or buffered.

use crate::rotation::{RotationReason, RotationThresholds};
use crate::segment::SegmentWriter;
use crate::stats::IngestStats;
use crate::subscription::InboundMessage;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace, warn};

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Written; the segment stays active.
    Written,
    /// Written, then the segment was rotated.
    Rotated(RotationReason),
    /// Lost to a write failure (or to no segment being available).
    Dropped,
    /// Skipped because its topic does not match the filter.
    Filtered,
}

/// Totals for a whole recorder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderSummary {
    /// Messages written to a segment.
    pub messages_recorded: u64,
    /// Payload bytes written to segments.
    pub bytes_written: u64,
    /// Messages lost to write failures.
    pub messages_dropped: u64,
    /// Messages skipped by the topic filter.
    pub messages_filtered: u64,
    /// Transient receive errors.
    pub receive_errors: u64,
    /// Segments opened during the run.
    pub segments_opened: u64,
    /// Segments closed during the run.
    pub segments_closed: u64,
}

/// Feeds messages into the segment writer.
#[derive(Debug)]
pub struct Ingestor {
    writer: SegmentWriter,
    thresholds: RotationThresholds,
    topic_filter: Bytes,
    stats: Arc<IngestStats>,
    summary: RecorderSummary,
}

impl Ingestor {
    /// Creates an ingestor around an (already opened) writer.
    pub fn new(
        writer: SegmentWriter,
        thresholds: RotationThresholds,
        topic_filter: impl Into<Bytes>,
        stats: Arc<IngestStats>,
    ) -> Self {
        stats.set_segment_size(writer.active_size());
        Self {
            writer,
            thresholds,
            topic_filter: topic_filter.into(),
            stats,
            summary: RecorderSummary::default(),
        }
    }

    /// Returns the segment writer.
    pub fn writer(&self) -> &SegmentWriter {
        &self.writer
    }

    /// Returns the totals so far.
    pub fn summary(&self) -> &RecorderSummary {
        &self.summary
    }

    /// Processes one message received at `now`.
    pub fn ingest(&mut self, message: &InboundMessage, now: Instant) -> IngestOutcome {
        if !message.matches(&self.topic_filter) {
            trace!(topic = ?message.topic, "skipping message for foreign topic");
            self.summary.messages_filtered += 1;
            return IngestOutcome::Filtered;
        }

        let payload = &message.payload;
        self.stats.record_message(payload.len() as u64);

        // A failed reopen left no active segment; try again before appending.
        if !self.writer.is_open() {
            if let Err(e) = self.writer.open(now) {
                warn!(error = %e, "No segment available, dropping message");
                self.summary.messages_dropped += 1;
                return IngestOutcome::Dropped;
            }
        }

        let size = match self.writer.append(payload) {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "Error writing to segment");
                self.summary.messages_dropped += 1;
                self.rotate(RotationReason::WriteFailure, now);
                self.stats.set_segment_size(self.writer.active_size());
                return IngestOutcome::Dropped;
            }
        };
        self.summary.messages_recorded += 1;
        self.summary.bytes_written += payload.len() as u64;

        let age = self.writer.active_age(now).unwrap_or_default();
        let outcome = match self.thresholds.check(size, age) {
            Some(reason) => {
                self.rotate(reason, now);
                IngestOutcome::Rotated(reason)
            }
            None => IngestOutcome::Written,
        };

        self.stats.set_segment_size(self.writer.active_size());
        outcome
    }

    /// Counts a transient receive error.
    pub fn record_receive_error(&mut self) {
        self.summary.receive_errors += 1;
    }

    /// Closes the active segment and returns the totals of the run.
    pub fn finish(mut self) -> RecorderSummary {
        self.writer.close();
        self.stats.set_segment_size(0);

        self.summary.segments_opened = self.writer.segments_opened();
        self.summary.segments_closed = self.writer.segments_closed();
        self.summary
    }

    fn rotate(&mut self, reason: RotationReason, now: Instant) {
        match self.writer.rotate(reason, now) {
            Ok(Some(closed)) => {
                info!(%reason, segment = %closed.name, size = closed.size, "Rotated segment");
            }
            Ok(None) => {}
            Err(e) => warn!(%reason, error = %e, "Failed to rotate segment"),
        }
    }
}
