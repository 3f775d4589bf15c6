//! Clock and identifier service.
//!
//! Provides monotonic wall-clock reads and unique operation/transfer ID
//! generation for the controller. All timestamps in the system are
//! milliseconds since the Unix epoch; the [`MonotonicClock`] wrapper
//! guarantees that successive reads never go backwards even when the
//! underlying system clock is stepped.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use uuid::Uuid;

/// Abstraction over the system clock for dependency injection.
///
/// Allows deterministic testing by replacing the real clock with a manual
/// one. The default implementation ([`SystemClock`]) delegates to
/// `std::time::SystemTime`.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before Unix epoch")
            .as_millis() as i64
    }
}

/// Manually advanced clock source for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<i64>,
}

impl ManualClock {
    /// Creates a manual clock starting at the given epoch milliseconds.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    /// Advances the clock by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: i64) {
        *self.now.lock() += delta_ms;
    }

    /// Sets the clock to an absolute value. May move backwards.
    pub fn set(&self, now_ms: i64) {
        *self.now.lock() = now_ms;
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> i64 {
        *self.now.lock()
    }
}

impl<T: ClockSource + ?Sized> ClockSource for std::sync::Arc<T> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Monotonic wrapper over a [`ClockSource`].
///
/// Reads are clamped so that each call returns a value greater than or
/// equal to the previous one. Event ordering invariants (non-decreasing
/// per-transfer timestamps) rely on this clamp, not on the host clock
/// being well-behaved.
pub struct MonotonicClock {
    source: Box<dyn ClockSource>,
    last: Mutex<i64>,
}

impl MonotonicClock {
    /// Creates a monotonic clock over the given source.
    #[must_use]
    pub fn new(source: Box<dyn ClockSource>) -> Self {
        Self {
            source,
            last: Mutex::new(0),
        }
    }

    /// Creates a monotonic clock over the real system time.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Box::new(SystemClock))
    }

    /// Returns the current time in epoch milliseconds, never less than a
    /// previously returned value.
    pub fn now_ms(&self) -> i64 {
        let mut last = self.last.lock();
        let raw = self.source.now_ms();
        if raw < *last {
            tracing::debug!(raw, clamped_to = *last, "system clock stepped backwards");
        }
        let now = raw.max(*last);
        *last = now;
        now
    }
}

impl std::fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicClock")
            .field("last", &*self.last.lock())
            .finish_non_exhaustive()
    }
}

/// Generates unique transfer and operation identifiers.
///
/// IDs are UUIDv4-based and prefixed by kind so that log lines and
/// persisted records remain self-describing.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// Returns a new unique transfer ID (`transfer-<uuid>`).
    #[must_use]
    pub fn transfer_id(&self) -> String {
        format!("transfer-{}", Uuid::new_v4())
    }

    /// Returns a new unique operation ID (`op-<uuid>`).
    #[must_use]
    pub fn operation_id(&self) -> String {
        format!("op-{}", Uuid::new_v4())
    }
}
