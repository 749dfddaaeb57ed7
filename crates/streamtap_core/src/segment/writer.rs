//! The segment writer.

use crate::error::{CoreError, CoreResult};
use crate::rotation::RotationReason;
use crate::segment::{SegmentName, SegmentStore};
use std::time::{Duration, Instant};
use streamtap_storage::StorageBackend;
use tracing::{debug, info, warn};

const MIB: f64 = 1024.0 * 1024.0;

/// The segment currently receiving appends.
struct ActiveSegment {
    name: SegmentName,
    backend: Box<dyn StorageBackend>,
    size: u64,
    opened_at: Instant,
}

/// A segment that has just been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSegment {
    /// Name of the closed segment.
    pub name: SegmentName,
    /// Bytes written to it.
    pub size: u64,
}

/// Owns the active segment and replaces it on rotation.
///
/// # Invariants
///
/// - At most one segment is open at any time
/// - A closed segment is never appended to again
/// - Sequence numbers are handed out once, even when creation fails
pub struct SegmentWriter {
    store: Box<dyn SegmentStore>,
    next_sequence: u64,
    active: Option<ActiveSegment>,
    segments_opened: u64,
    segments_closed: u64,
}

impl SegmentWriter {
    /// Creates a writer whose first segment gets `first_sequence`.
    pub fn new(store: Box<dyn SegmentStore>, first_sequence: u64) -> Self {
        Self {
            store,
            next_sequence: first_sequence,
            active: None,
            segments_opened: 0,
            segments_closed: 0,
        }
    }

    /// Provisions the store and continues numbering after the highest
    /// sequence already present in it.
    pub fn resume(mut store: Box<dyn SegmentStore>) -> CoreResult<Self> {
        store.provision()?;
        let next_sequence = store
            .list()?
            .last()
            .map_or(0, |info| info.name.sequence().saturating_add(1));

        if next_sequence > 0 {
            debug!(next_sequence, "resuming segment numbering");
        }

        Ok(Self::new(store, next_sequence))
    }

    /// Opens a new segment, closing the active one first if there is one.
    ///
    /// On success the new segment is active with size 0 and its age clock
    /// starts at `now`.
    pub fn open(&mut self, now: Instant) -> CoreResult<&SegmentName> {
        self.close();

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);

        let name = SegmentName::now(sequence);
        let backend = self.store.create(&name)?;
        info!("Opened new output segment: {}", name);

        self.segments_opened += 1;
        let active = self.active.insert(ActiveSegment {
            name,
            backend,
            size: 0,
            opened_at: now,
        });
        Ok(&active.name)
    }

    /// Appends a payload to the active segment.
    ///
    /// Returns the segment size after the append.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveSegment`] if no segment is open, or the
    /// storage error if the write failed. A failed write is not retried; the
    /// tracked size then follows what the backend reports.
    pub fn append(&mut self, payload: &[u8]) -> CoreResult<u64> {
        let active = self.active.as_mut().ok_or(CoreError::NoActiveSegment)?;
        if let Err(e) = active.backend.append(payload) {
            // A failed write may still have landed a prefix.
            if let Ok(size) = active.backend.size() {
                active.size = size;
            }
            return Err(e.into());
        }
        active.size += payload.len() as u64;
        Ok(active.size)
    }

    /// Flushes and closes the active segment.
    ///
    /// Does nothing if no segment is open. Close errors are logged and
    /// otherwise ignored.
    pub fn close(&mut self) -> Option<ClosedSegment> {
        let mut active = self.active.take()?;

        if let Err(e) = active.backend.close() {
            warn!(segment = %active.name, error = %e, "Error closing segment");
        }
        self.segments_closed += 1;
        info!(
            "Closed segment {}, size: {:.2} MB",
            active.name,
            active.size as f64 / MIB
        );

        Some(ClosedSegment {
            name: active.name,
            size: active.size,
        })
    }

    /// Closes the active segment and opens its successor.
    ///
    /// This is the single rotation entry point for every [`RotationReason`].
    ///
    /// # Errors
    ///
    /// Returns the error of opening the successor. The writer is then left
    /// without an active segment.
    pub fn rotate(
        &mut self,
        reason: RotationReason,
        now: Instant,
    ) -> CoreResult<Option<ClosedSegment>> {
        debug!(%reason, "rotating segment");
        let closed = self.close();
        self.open(now)?;
        Ok(closed)
    }

    /// Returns `true` if a segment is open.
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the name of the active segment.
    pub fn active_name(&self) -> Option<&SegmentName> {
        self.active.as_ref().map(|active| &active.name)
    }

    /// Returns the size of the active segment, or 0 if none is open.
    pub fn active_size(&self) -> u64 {
        self.active.as_ref().map_or(0, |active| active.size)
    }

    /// Returns how long the active segment has been open at `now`.
    pub fn active_age(&self, now: Instant) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|active| now.saturating_duration_since(active.opened_at))
    }

    /// Returns the sequence number the next segment will get.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Returns the number of segments opened by this writer.
    pub fn segments_opened(&self) -> u64 {
        self.segments_opened
    }

    /// Returns the number of segments closed by this writer.
    pub fn segments_closed(&self) -> u64 {
        self.segments_closed
    }
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("active", &self.active_name())
            .field("active_size", &self.active_size())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}
