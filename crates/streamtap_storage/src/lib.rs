//! # streamtap storage
//!
//! Append-only storage backends for streamtap segments.
//!
//! Backends are **opaque byte sinks**: they never interpret what they store.
//! A segment is nothing more than the concatenation of every payload that
//! was appended to its backend.
//!
//! ## Design Principles
//!
//! - Backends are simple byte sinks (append, size, close)
//! - No knowledge of segment naming or rotation
//! - Must be `Send + Sync` so the recorder can move them between tasks
//! - A closed backend rejects every further append
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing, with write fault injection
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use streamtap_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello ").unwrap();
//! assert_eq!(backend.append(b"world").unwrap(), offset + 6);
//! assert_eq!(backend.size().unwrap(), 11);
//! backend.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
