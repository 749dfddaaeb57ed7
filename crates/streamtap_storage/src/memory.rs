//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Fault-injection tests of write failure handling
///
/// # Shared State
///
/// Clones share the same buffer. A test can keep a clone of a backend after
/// handing the original to a segment writer, then inspect what was written,
/// whether it was closed, or make its next appends fail.
///
/// # Example
///
/// ```rust
/// use streamtap_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let observer = backend.clone();
///
/// backend.append(b"test data").unwrap();
/// assert_eq!(observer.data(), b"test data");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    closed: bool,
    close_count: usize,
    failing_appends: usize,
    torn_append: Option<usize>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.state.read().data.clone()
    }

    /// Returns `true` once the backend has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Returns how many times `close` released this backend.
    ///
    /// Repeated closes are no-ops and are not counted.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.read().close_count
    }

    /// Makes the next `count` appends fail with an I/O error.
    pub fn fail_next_appends(&self, count: usize) {
        self.state.write().failing_appends = count;
    }

    /// Makes the next append write only its first `keep` bytes and then
    /// fail, like a disk filling up mid-write.
    pub fn tear_next_append(&self, keep: usize) {
        self.state.write().torn_append = Some(keep);
    }
}

impl StorageBackend for InMemoryBackend {
    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut state = self.state.write();
        if state.closed {
            return Err(StorageError::Closed);
        }

        if let Some(keep) = state.torn_append.take() {
            let keep = keep.min(new_data.len());
            state.data.extend_from_slice(&new_data[..keep]);
            return Err(injected_failure());
        }

        if state.failing_appends > 0 {
            state.failing_appends -= 1;
            return Err(injected_failure());
        }

        let offset = state.data.len() as u64;
        state.data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.state.read().data.len() as u64)
    }

    fn close(&mut self) -> StorageResult<()> {
        let mut state = self.state.write();
        if !state.closed {
            state.closed = true;
            state.close_count += 1;
        }
        Ok(())
    }
}

fn injected_failure() -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "injected write failure",
    ))
}
