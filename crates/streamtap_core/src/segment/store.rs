//! Where segments live.

use crate::error::{CoreError, CoreResult};
use crate::segment::{SegmentInfo, SegmentName};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use streamtap_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// Creates and enumerates segments.
///
/// The store is the only place that knows where segments physically live.
/// The segment writer asks it for a fresh backend on every rotation.
pub trait SegmentStore: Send {
    /// Prepares the store for writing, e.g. by creating its directory.
    fn provision(&mut self) -> CoreResult<()>;

    /// Lists existing segments, ordered by sequence number.
    fn list(&self) -> CoreResult<Vec<SegmentInfo>>;

    /// Creates a new, empty segment.
    fn create(&mut self, name: &SegmentName) -> CoreResult<Box<dyn StorageBackend>>;
}

/// A store that keeps segments as files in one directory.
#[derive(Debug, Clone)]
pub struct FileSegmentStore {
    dir: PathBuf,
}

impl FileSegmentStore {
    /// Creates a store rooted at `dir`. Nothing is touched on disk until
    /// [`SegmentStore::provision`] is called.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the segment directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SegmentStore for FileSegmentStore {
    fn provision(&mut self) -> CoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn list(&self) -> CoreResult<Vec<SegmentInfo>> {
        let mut segments = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(SegmentName::parse) else {
                continue;
            };

            segments.push(SegmentInfo {
                name,
                size: metadata.len(),
                path: Some(entry.path()),
            });
        }

        segments.sort_by_key(|info| info.name.sequence());
        Ok(segments)
    }

    fn create(&mut self, name: &SegmentName) -> CoreResult<Box<dyn StorageBackend>> {
        let path = self.dir.join(name.to_string());
        let backend = FileBackend::create(&path)?;
        Ok(Box::new(backend))
    }
}

/// A store that keeps segments in memory.
///
/// Clones share the same segments, so a test can hand one clone to a
/// recorder and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct InMemorySegmentStore {
    state: Arc<Mutex<MemoryStoreState>>,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    segments: Vec<(SegmentName, InMemoryBackend)>,
    failing_creates: usize,
}

impl InMemorySegmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every segment created so far, in creation order.
    pub fn segments(&self) -> Vec<(SegmentName, InMemoryBackend)> {
        self.state.lock().segments.clone()
    }

    /// Returns the backend of the segment with the given sequence number.
    pub fn backend(&self, sequence: u64) -> Option<InMemoryBackend> {
        self.state
            .lock()
            .segments
            .iter()
            .find(|(name, _)| name.sequence() == sequence)
            .map(|(_, backend)| backend.clone())
    }

    /// Makes the next `count` segment creations fail.
    pub fn fail_next_creates(&self, count: usize) {
        self.state.lock().failing_creates = count;
    }
}

impl SegmentStore for InMemorySegmentStore {
    fn provision(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn list(&self) -> CoreResult<Vec<SegmentInfo>> {
        let mut segments: Vec<SegmentInfo> = self
            .state
            .lock()
            .segments
            .iter()
            .map(|(name, backend)| SegmentInfo {
                name: name.clone(),
                size: backend.data().len() as u64,
                path: None,
            })
            .collect();
        segments.sort_by_key(|info| info.name.sequence());
        Ok(segments)
    }

    fn create(&mut self, name: &SegmentName) -> CoreResult<Box<dyn StorageBackend>> {
        let mut state = self.state.lock();

        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected create failure",
            )));
        }

        let backend = InMemoryBackend::new();
        state.segments.push((name.clone(), backend.clone()));
        Ok(Box::new(backend))
    }
}
