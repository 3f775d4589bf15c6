//! Graceful shutdown coordination for the controller core.
//!
//! Tracks lifecycle state with lock-free reads, counts in-flight request
//! handling with RAII guards, and fans the shutdown signal out through a
//! watch channel. On shutdown the orchestrator cancels its watchdogs and
//! persistence is flushed; control connections are not notified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Controller lifecycle state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Subsystems are loading persisted state.
    Starting,
    /// Requests and events are being accepted.
    Ready,
    /// Shutdown signaled; in-flight handling is draining.
    Draining,
    /// All in-flight handling completed.
    Stopped,
}

/// Coordinates graceful shutdown across the controller.
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    state: ArcSwap<LifecycleState>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            state: ArcSwap::from_pointee(LifecycleState::Starting),
        }
    }

    /// Marks the controller ready to accept requests.
    pub fn set_ready(&self) {
        self.state.store(Arc::new(LifecycleState::Ready));
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        **self.state.load()
    }

    /// Returns a receiver notified when shutdown is triggered. Timer
    /// tasks select on this alongside their sleeps.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Signals shutdown and transitions to `Draining`.
    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(LifecycleState::Draining));
        // Receivers may all have been dropped already.
        let _ = self.shutdown_signal.send(true);
    }

    /// RAII guard counting one in-flight request. The count drops even
    /// if the handler panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Current number of in-flight requests.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits until in-flight handling drains, up to `timeout`.
    ///
    /// Returns `true` on a clean drain (state becomes `Stopped`);
    /// `false` when the timeout expired with handlers still running.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.state.store(Arc::new(LifecycleState::Stopped));
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
