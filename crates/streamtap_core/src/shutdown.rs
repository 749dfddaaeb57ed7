//! Lifecycle state and shutdown signalling.
//!
//! A [`ShutdownHandle`] is a cloneable, one-shot cancellation signal. The
//! first trigger wins; later triggers are ignored, so a second Ctrl+C while
//! the recorder is already stopping changes nothing.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownHandle::new();
//!
//! let trigger = shutdown.clone();
//! tokio::spawn(async move {
//!     let signal = shutdown_signal().await;
//!     trigger.trigger(signal);
//! });
//!
//! let summary = recorder.run(shutdown).await;
//! ```

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

/// Where the recorder is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Storage provisioned, first segment open, loop not yet started.
    Initializing,
    /// The ingestion loop is executing.
    Running,
    /// Shutdown requested; the loop has stopped and resources are released.
    Stopping,
    /// Terminal.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What requested the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Received SIGINT (Ctrl+C)
    SigInt,
    /// Received SIGTERM
    SigTerm,
    /// Requested by code
    Manual,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SigInt => write!(f, "SIGINT (Ctrl+C)"),
            Self::SigTerm => write!(f, "SIGTERM"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Handle for triggering and awaiting shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<Option<ShutdownSignal>>>,
    receiver: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownHandle {
    /// Creates a handle that has not been triggered.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Requests shutdown.
    ///
    /// Returns `false` if shutdown had already been requested, in which case
    /// nothing changes.
    pub fn trigger(&self, signal: ShutdownSignal) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal);
            true
        })
    }

    /// Requests a manual shutdown.
    pub fn shutdown(&self) -> bool {
        self.trigger(ShutdownSignal::Manual)
    }

    /// Waits until shutdown is requested and returns what requested it.
    ///
    /// Cancel-safe.
    pub async fn wait(&mut self) -> ShutdownSignal {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(signal) => (*signal).unwrap_or(ShutdownSignal::Manual),
            // The sender lives as long as any handle, including this one.
            Err(_) => ShutdownSignal::Manual,
        }
    }

    /// Returns the signal that requested shutdown, if any.
    pub fn signal(&self) -> Option<ShutdownSignal> {
        *self.receiver.borrow()
    }

    /// Returns `true` if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.signal().is_some()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes when the process receives SIGINT or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that signal is
/// never reported.
pub async fn shutdown_signal() -> ShutdownSignal {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::SigInt,
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                ShutdownSignal::SigTerm
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn signal_display() {
        assert_eq!(ShutdownSignal::SigInt.to_string(), "SIGINT (Ctrl+C)");
        assert_eq!(ShutdownSignal::SigTerm.to_string(), "SIGTERM");
        assert_eq!(ShutdownSignal::Manual.to_string(), "manual");
        assert_eq!(LifecycleState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn first_trigger_wins() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_shutdown());

        assert!(handle.trigger(ShutdownSignal::SigTerm));
        assert!(!handle.trigger(ShutdownSignal::SigInt));
        assert!(!handle.shutdown());

        assert_eq!(handle.signal(), Some(ShutdownSignal::SigTerm));
    }

    #[test]
    fn clones_share_state() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();

        clone.shutdown();
        assert!(handle.is_shutdown());
    }

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let mut handle = ShutdownHandle::new();
        let trigger = handle.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger(ShutdownSignal::SigInt);
        });

        assert_eq!(handle.wait().await, ShutdownSignal::SigInt);
    }

    #[tokio::test]
    async fn wait_after_trigger_is_immediate() {
        let mut handle = ShutdownHandle::new();
        handle.shutdown();
        assert_eq!(handle.wait().await, ShutdownSignal::Manual);
        // Still resolved on a second wait.
        assert_eq!(handle.wait().await, ShutdownSignal::Manual);
    }
}
