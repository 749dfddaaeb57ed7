//! Segment rotation policy.
//!
//! The policy is a pure function of the active segment's size and age. It is
//! evaluated after every successful append, so the message that crosses the
//! size threshold stays in the segment it crossed; the next message starts a
//! fresh one. Rotation is message-triggered: an idle stream never rotates.

use std::fmt;
use std::time::Duration;

/// Why the active segment is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// The segment reached the size threshold.
    Size,
    /// The segment reached the age threshold.
    Age,
    /// An append failed and the segment is no longer trusted.
    WriteFailure,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "size"),
            Self::Age => write!(f, "age"),
            Self::WriteFailure => write!(f, "write failure"),
        }
    }
}

/// Size and age limits for a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationThresholds {
    max_segment_size: u64,
    max_segment_age: Duration,
}

impl RotationThresholds {
    /// Creates a new set of thresholds.
    pub const fn new(max_segment_size: u64, max_segment_age: Duration) -> Self {
        Self {
            max_segment_size,
            max_segment_age,
        }
    }

    /// Returns the size threshold in bytes.
    pub const fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Returns the age threshold.
    pub const fn max_segment_age(&self) -> Duration {
        self.max_segment_age
    }

    /// Decides whether a segment must be rotated.
    ///
    /// `size` already includes the message that was just appended. Size wins
    /// over age when both thresholds are reached.
    #[must_use]
    pub fn check(&self, size: u64, age: Duration) -> Option<RotationReason> {
        if size >= self.max_segment_size {
            Some(RotationReason::Size)
        } else if age >= self.max_segment_age {
            Some(RotationReason::Age)
        } else {
            None
        }
    }
}

/// Returns `true` when a segment of `size` bytes opened `age` ago is due.
#[must_use]
pub fn should_rotate(size: u64, age: Duration, thresholds: &RotationThresholds) -> bool {
    thresholds.check(size, age).is_some()
}
