//! Recorder configuration.

use crate::error::{CoreError, CoreResult};
use crate::rotation::RotationThresholds;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a recorder run.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Publisher endpoint, e.g. `tcp://127.0.0.1:5555`.
    pub endpoint: String,

    /// Topic filter for the subscription (prefix match).
    pub topic: String,

    /// Directory that receives the segment files.
    pub output_dir: PathBuf,

    /// Size at which the active segment is rotated.
    pub max_segment_size: u64,

    /// Age at which the active segment is rotated.
    pub max_segment_age: Duration,

    /// Period of the throughput report.
    pub stats_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:5555".to_string(),
            topic: "tt_data".to_string(),
            output_dir: PathBuf::from("data"),
            max_segment_size: 500 * 1024 * 1024,          // 500 MiB
            max_segment_age: Duration::from_secs(60 * 60), // 1 hour
            stats_interval: Duration::from_secs(1),
        }
    }
}

impl RecorderConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the publisher endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the topic filter.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the maximum segment size in bytes.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the maximum segment age.
    #[must_use]
    pub const fn max_segment_age(mut self, age: Duration) -> Self {
        self.max_segment_age = age;
        self
    }

    /// Sets the statistics reporting interval.
    #[must_use]
    pub const fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Returns the rotation thresholds described by this configuration.
    #[must_use]
    pub fn thresholds(&self) -> RotationThresholds {
        RotationThresholds::new(self.max_segment_size, self.max_segment_age)
    }

    /// Checks that the configuration can drive a recorder.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(CoreError::invalid_config("endpoint must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CoreError::invalid_config("output directory must not be empty"));
        }
        if self.max_segment_size == 0 {
            return Err(CoreError::invalid_config("max segment size must be positive"));
        }
        if self.max_segment_age.is_zero() {
            return Err(CoreError::invalid_config("max segment age must be positive"));
        }
        if self.stats_interval.is_zero() {
            return Err(CoreError::invalid_config("stats interval must be positive"));
        }
        Ok(())
    }
}
