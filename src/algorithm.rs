//! The next-state function: the algorithmic heart of the limiter.
//!
//! `next` is a pure, side-effect-free mapping `(prev, permits, timeout_nanos,
//! now_nanos) -> State`. Two threads computing it against the same inputs
//! must produce identical output — the surrounding CAS loop in
//! [`crate::limiter::RateLimiter`] depends on that determinism for
//! correctness. Nothing in this module touches the atomic cell, parks a
//! thread, or emits an event; all of that is the façade's job.

use crate::state::State;

/// Sentinel passed as `timeout_nanos` by the metrics "simulate, don't write"
/// helpers: any non-negative `wait` is necessarily greater than this, so the
/// reservation branch is never taken and the snapshot returned is read-only
/// in effect (callers discard it rather than installing it).
pub const NEVER_WAIT: i64 = -1;

/// Compute the next snapshot for a request of `permits`, given the previous
/// snapshot, the caller's willingness to wait (`timeout_nanos`, or
/// [`NEVER_WAIT`] to force the non-reserving branch), and the current
/// monotonic time relative to the limiter's anchor.
///
/// See `SPEC_FULL.md` §4.1 for the derivation of each step.
pub fn next(prev: &State, permits: i64, timeout_nanos: i64, now_nanos: u64) -> State {
    debug_assert!(permits >= 1, "permits must be a positive integer, got {permits}");
    let refresh_period = prev.config.refresh_period_nanos();
    let limit = prev.config.limit_per_period();
    let cycle_now = now_nanos / refresh_period;

    // Step 1 — cycle advance. Widen to i128 so that a long idle interval
    // (elapsed_cycles * limit) cannot overflow before the cap below clamps
    // it back down to a single cycle's worth of credit.
    let new_permissions: i64 = if cycle_now > prev.active_cycle {
        let elapsed_cycles = cycle_now - prev.active_cycle;
        let accumulated = (elapsed_cycles as i128) * (limit as i128);
        let candidate = prev.active_permissions as i128 + accumulated;
        candidate.min(limit as i128) as i64
    } else {
        prev.active_permissions
    };

    // Step 2 — wait computation.
    let wait: u64 = if new_permissions >= permits {
        0
    } else {
        let nanos_to_next_cycle = (cycle_now + 1) * refresh_period - now_nanos;
        let permissions_at_next = new_permissions as i128 + limit as i128;
        let shortfall = (permits as i128 - permissions_at_next).max(0);
        let full_cycles_to_wait = ceil_div(shortfall, limit as i128);
        full_cycles_to_wait as u64 * refresh_period + nanos_to_next_cycle
    };

    // Step 3 — reservation. A negative timeout_nanos (NEVER_WAIT) can never
    // satisfy `>= wait` since wait is unsigned, so this branch is skipped.
    let active_permissions = if timeout_nanos >= 0 && timeout_nanos as u64 >= wait {
        new_permissions - permits
    } else {
        new_permissions
    };

    State {
        config: prev.config.clone(),
        active_cycle: cycle_now,
        active_permissions,
        nanos_to_wait: wait,
    }
}

/// Integer ceiling division for non-negative operands.
fn ceil_div(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    if numerator == 0 {
        0
    } else {
        (numerator + denominator - 1) / denominator
    }
}
