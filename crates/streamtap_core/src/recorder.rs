//! The recorder: wires storage, ingestion, statistics and shutdown together.
//!
//! A recorder moves through `Initializing → Running → Stopping → Stopped`.
//! [`Recorder::start`] performs every fallible startup step and leaves the
//! recorder `Initializing` with its first segment open. [`Recorder::run`]
//! drives the ingestion loop until shutdown is requested or the inbound
//! stream ends, then closes the active segment exactly once.
//!
//! The loop is a single task. It selects over three events, checked in
//! this order on every iteration:
//! 1. the shutdown signal,
//! 2. the statistics tick,
//! 3. the next inbound message.
//!
//! Shutdown is therefore observed between messages, never during an append,
//! and the segment writer is only closed after the loop has returned.

use crate::config::RecorderConfig;
use crate::error::CoreResult;
use crate::ingest::{Ingestor, RecorderSummary};
use crate::segment::{SegmentName, SegmentStore, SegmentWriter};
use crate::shutdown::{LifecycleState, ShutdownHandle};
use crate::stats::{IngestStats, StatsReporter, StatsSnapshot};
use crate::subscription::{Subscription, TransportError};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A configured recorder over one subscription.
pub struct Recorder<S> {
    config: RecorderConfig,
    subscription: S,
    ingestor: Ingestor,
    stats: Arc<IngestStats>,
    reporter: StatsReporter,
    state: watch::Sender<LifecycleState>,
}

impl<S: Subscription> Recorder<S> {
    /// Validates the configuration, provisions the store and opens the
    /// first segment.
    ///
    /// `subscription` must already be connected and subscribed.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: an invalid configuration, a store that
    /// cannot be provisioned or listed, or a first segment that cannot be
    /// created.
    pub fn start(
        config: RecorderConfig,
        store: Box<dyn SegmentStore>,
        subscription: S,
    ) -> CoreResult<Self> {
        config.validate()?;

        let mut writer = SegmentWriter::resume(store)?;
        writer.open(Instant::now().into_std())?;

        let stats = Arc::new(IngestStats::new());
        let reporter = StatsReporter::new(Arc::clone(&stats));
        let ingestor = Ingestor::new(
            writer,
            config.thresholds(),
            config.topic.clone(),
            Arc::clone(&stats),
        );
        let (state, _) = watch::channel(LifecycleState::Initializing);

        Ok(Self {
            config,
            subscription,
            ingestor,
            stats,
            reporter,
            state,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn state_watcher(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Returns the shared throughput counters.
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Subscribes to the periodic statistics snapshots.
    pub fn subscribe_stats(&self) -> broadcast::Receiver<StatsSnapshot> {
        self.reporter.subscribe()
    }

    /// Returns the name of the active segment.
    pub fn active_segment(&self) -> Option<&SegmentName> {
        self.ingestor.writer().active_name()
    }

    /// Runs the ingestion loop until shutdown, then stops the recorder.
    ///
    /// Returns the totals of the run. Errors during the loop are logged and
    /// never end it; only shutdown or a closed inbound stream do.
    pub async fn run(self, mut shutdown: ShutdownHandle) -> RecorderSummary {
        let Self {
            config,
            mut subscription,
            mut ingestor,
            reporter,
            state,
            ..
        } = self;

        state.send_replace(LifecycleState::Running);
        info!(
            endpoint = %config.endpoint,
            topic = %config.topic,
            output_dir = %config.output_dir.display(),
            "Recording started"
        );

        let period = config.stats_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                signal = shutdown.wait() => {
                    info!("Received {}, shutting down", signal);
                    break;
                }

                _ = ticker.tick() => {
                    reporter.report();
                }

                received = subscription.recv() => match received {
                    Ok(message) => {
                        ingestor.ingest(&message, Instant::now().into_std());
                    }
                    Err(TransportError::Closed) => {
                        warn!("Inbound stream closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Error receiving message");
                        ingestor.record_receive_error();
                    }
                },
            }
        }

        state.send_replace(LifecycleState::Stopping);

        if let Err(e) = subscription.close().await {
            warn!(error = %e, "Error disconnecting from publisher");
        }
        debug!("inbound stream released");

        let summary = ingestor.finish();
        state.send_replace(LifecycleState::Stopped);

        info!(
            messages_recorded = summary.messages_recorded,
            bytes_written = summary.bytes_written,
            messages_dropped = summary.messages_dropped,
            messages_filtered = summary.messages_filtered,
            receive_errors = summary.receive_errors,
            segments_opened = summary.segments_opened,
            segments_closed = summary.segments_closed,
            "Recorder stopped"
        );

        summary
    }
}

impl<S> std::fmt::Debug for Recorder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .field("writer", self.ingestor.writer())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::InMemorySegmentStore;
    use crate::subscription::ChannelSubscription;
    use crate::CoreError;

    fn config() -> RecorderConfig {
        RecorderConfig::new().topic("t").max_segment_size(1024)
    }

    #[test]
    fn start_opens_first_segment() {
        let store = InMemorySegmentStore::new();
        let (_publisher, subscription) = ChannelSubscription::new(4);

        let recorder = Recorder::start(config(), Box::new(store.clone()), subscription).unwrap();

        assert_eq!(recorder.state(), LifecycleState::Initializing);
        assert_eq!(recorder.active_segment().unwrap().sequence(), 0);
        assert_eq!(store.segments().len(), 1);
    }

    #[test]
    fn start_rejects_invalid_config() {
        let (_publisher, subscription) = ChannelSubscription::new(4);
        let result = Recorder::start(
            config().max_segment_size(0),
            Box::new(InMemorySegmentStore::new()),
            subscription,
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn start_fails_when_first_segment_cannot_be_created() {
        let store = InMemorySegmentStore::new();
        store.fail_next_creates(1);
        let (_publisher, subscription) = ChannelSubscription::new(4);

        let result = Recorder::start(config(), Box::new(store), subscription);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn closed_stream_stops_recorder() {
        let store = InMemorySegmentStore::new();
        let (publisher, subscription) = ChannelSubscription::new(4);
        let recorder = Recorder::start(config(), Box::new(store.clone()), subscription).unwrap();
        let states = recorder.state_watcher();

        publisher.publish("t", "abc").await.unwrap();
        drop(publisher);

        let summary = recorder.run(ShutdownHandle::new()).await;

        assert_eq!(*states.borrow(), LifecycleState::Stopped);
        assert_eq!(summary.messages_recorded, 1);
        assert_eq!(store.backend(0).unwrap().data(), b"abc");
        assert_eq!(store.backend(0).unwrap().close_count(), 1);
    }
}
