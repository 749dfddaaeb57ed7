//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level, append-only storage backend.
///
/// Storage backends are **opaque byte sinks**. The recorder appends raw
/// payloads to them, with no framing and no headers.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `size` counts every byte that reached the backend, including the
///   prefix of a failed append
/// - `close` flushes and syncs; afterwards `append` fails with
///   [`StorageError::Closed`](crate::StorageError::Closed)
/// - Backends must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is closed or an I/O error occurs.
    /// A failed append may have written a prefix of `data`.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes, syncs and releases the backend.
    ///
    /// Closing an already closed backend is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails. The backend is
    /// released regardless.
    fn close(&mut self) -> StorageResult<()>;
}
