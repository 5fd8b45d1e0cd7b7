//! Monotonic time source abstraction
//!
//! The limiter's algorithm (`crate::algorithm::next`) works entirely in
//! nanoseconds elapsed since a limiter's construction. `Clock` lets tests
//! drive that elapsed time deterministically instead of sleeping in real
//! time for every scenario in `SPEC_FULL.md` §8.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A monotonic nanosecond time source.
pub trait Clock: Send + Sync {
    /// Nanoseconds elapsed since some fixed but unspecified origin. Only
    /// differences between two calls are meaningful.
    fn now_nanos(&self) -> u64;
}

/// Default clock: the process's monotonic clock, anchored at the instant
/// this clock is created (normally limiter construction time).
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    /// Anchor a new monotonic clock at the current instant.
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        self.anchor.elapsed().as_nanos() as u64
    }
}

/// A clock that only advances when told to — used by tests that need to
/// pin exact cycle boundaries without sleeping in real time.
#[derive(Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `nanos`.
    pub fn advance(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Set the clock to an absolute nanosecond value.
    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
