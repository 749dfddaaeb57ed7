//! Record command implementation.

use crate::zmq::ZmqSubscription;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use streamtap_core::{
    shutdown_signal, FileSegmentStore, Recorder, RecorderConfig, ShutdownHandle,
};
use tracing::{info, warn};

/// Arguments of the record command. Unset options keep their defaults.
#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Publisher endpoint [default: tcp://127.0.0.1:5555]
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Topic filter [default: tt_data]
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Directory for segment files [default: data]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rotate segments at this size in bytes [default: 524288000]
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Rotate segments at this age in seconds [default: 3600]
    #[arg(long)]
    pub max_age_secs: Option<u64>,

    /// Statistics interval in milliseconds [default: 1000]
    #[arg(long)]
    pub stats_interval_ms: Option<u64>,
}

impl RecordArgs {
    /// Applies the given options over the default configuration.
    pub fn into_config(self) -> RecorderConfig {
        let mut config = RecorderConfig::default();
        if let Some(endpoint) = self.endpoint {
            config = config.endpoint(endpoint);
        }
        if let Some(topic) = self.topic {
            config = config.topic(topic);
        }
        if let Some(output) = self.output {
            config = config.output_dir(output);
        }
        if let Some(size) = self.max_size {
            config = config.max_segment_size(size);
        }
        if let Some(secs) = self.max_age_secs {
            config = config.max_segment_age(Duration::from_secs(secs));
        }
        if let Some(ms) = self.stats_interval_ms {
            config = config.stats_interval(Duration::from_millis(ms));
        }
        config
    }
}

/// Runs the record command until SIGINT or SIGTERM.
pub async fn run(args: RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config();
    config.validate()?;

    // Signals are handled from here on, so Ctrl+C also ends a slow connect.
    let shutdown = ShutdownHandle::new();
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let signal = shutdown_signal().await;
                if !shutdown.trigger(signal) {
                    warn!("Received {} while already stopping, ignoring", signal);
                }
            }
        })
    };

    let store = FileSegmentStore::new(config.output_dir.clone());
    let mut waiter = shutdown.clone();
    let subscription = tokio::select! {
        connected = ZmqSubscription::connect(&config.endpoint, &config.topic) => connected?,
        signal = waiter.wait() => {
            info!("Received {} before connecting, exiting", signal);
            signals.abort();
            return Ok(());
        }
    };
    let recorder = Recorder::start(config, Box::new(store), subscription)?;

    let summary = recorder.run(shutdown).await;
    signals.abort();

    info!(
        "Recorded {} messages ({} bytes) into {} segments",
        summary.messages_recorded, summary.bytes_written, summary.segments_closed
    );
    Ok(())
}
