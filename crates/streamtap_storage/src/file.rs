//! File-based storage backend for persistent segments.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Each backend owns exactly one segment file. Files are always created
/// fresh: [`FileBackend::create`] refuses to open a file that already exists,
/// so a segment is never reopened once it has been closed.
///
/// # Durability
///
/// `close()` flushes the file, syncs it with `File::sync_all()` and then
/// drops the handle.
///
/// # Example
///
/// ```no_run
/// use streamtap_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("data_20240101120000_0.bin")).unwrap();
/// backend.append(b"payload").unwrap();
/// backend.close().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<Option<File>>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Creates a new, empty file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            size: RwLock::new(0),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` once [`StorageBackend::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.read().is_none()
    }
}

impl StorageBackend for FileBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or(StorageError::Closed)?;
        let mut size = self.size.write();

        let offset = *size;
        if data.is_empty() {
            return Ok(offset);
        }

        if let Err(e) = file.write_all(data) {
            // A partial write may have landed; keep the tracked size honest.
            if let Ok(metadata) = file.metadata() {
                *size = metadata.len();
            }
            return Err(e.into());
        }
        *size += data.len() as u64;

        Ok(offset)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn close(&mut self) -> StorageResult<()> {
        let Some(mut file) = self.file.write().take() else {
            return Ok(());
        };

        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
