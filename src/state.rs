//! The immutable state snapshot installed under the limiter's atomic cell

use crate::config::Configuration;

/// Immutable quadruple `(config, active_cycle, active_permissions,
/// nanos_to_wait)`. Every state transition of a [`crate::limiter::RateLimiter`]
/// produces a brand new `State` via [`crate::algorithm::next`] and installs
/// it with a single compare-and-swap — the quadruple is never updated
/// in place, and it is never sharded across separate atomics, so no reader
/// can observe a torn combination of config and permit accounting.
#[derive(Clone)]
pub struct State {
    /// Configuration active as of this snapshot.
    pub config: Configuration,
    /// Cycle index `floor(elapsed_nanos / refresh_period)` recorded at the
    /// last update.
    pub active_cycle: u64,
    /// Remaining permits for the current cycle. May be negative: a negative
    /// value means future permits have already been pre-reserved.
    pub active_permissions: i64,
    /// How long the most recently reserving caller must sleep before its
    /// reservation matures.
    pub nanos_to_wait: u64,
}

impl State {
    /// The initial snapshot for a freshly constructed limiter: cycle 0, a
    /// full bucket, and nothing to wait for.
    pub fn initial(config: Configuration) -> Self {
        let active_permissions = config.limit_per_period();
        Self {
            config,
            active_cycle: 0,
            active_permissions,
            nanos_to_wait: 0,
        }
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("active_cycle", &self.active_cycle)
            .field("active_permissions", &self.active_permissions)
            .field("nanos_to_wait", &self.nanos_to_wait)
            .finish()
    }
}
