//! # streamtap core
//!
//! Ingestion and segmentation engine for streamtap.
//!
//! This crate provides:
//! - Segment naming, storage provisioning and the segment writer
//! - A pure rotation policy (size and age thresholds)
//! - Atomic throughput counters and the periodic statistics reporter
//! - The ingestion loop over an abstract [`Subscription`]
//! - The recorder lifecycle (`Initializing → Running → Stopping → Stopped`)
//!
//! # Example
//!
//! ```rust,ignore
//! use streamtap_core::{FileSegmentStore, Recorder, RecorderConfig, ShutdownHandle};
//!
//! let config = RecorderConfig::default().output_dir("data");
//! let store = FileSegmentStore::new(config.output_dir.clone());
//! let recorder = Recorder::start(config, Box::new(store), subscription)?;
//!
//! let shutdown = ShutdownHandle::new();
//! let summary = recorder.run(shutdown).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod ingest;
mod recorder;
mod rotation;
mod segment;
mod shutdown;
mod stats;
mod subscription;

pub use config::RecorderConfig;
pub use error::{CoreError, CoreResult};
pub use ingest::{IngestOutcome, Ingestor, RecorderSummary};
pub use recorder::Recorder;
pub use rotation::{should_rotate, RotationReason, RotationThresholds};
pub use segment::{
    ClosedSegment, FileSegmentStore, InMemorySegmentStore, SegmentInfo, SegmentName,
    SegmentStore, SegmentWriter, SEGMENT_EXTENSION, SEGMENT_PREFIX,
};
pub use shutdown::{shutdown_signal, LifecycleState, ShutdownHandle, ShutdownSignal};
pub use stats::{IngestStats, StatsReporter, StatsSnapshot};
pub use subscription::{
    ChannelPublisher, ChannelSubscription, InboundMessage, Subscription, TransportError,
    TransportResult,
};

/// Version of the streamtap core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
