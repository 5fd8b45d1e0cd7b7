//! The rate limiter façade: acquire, reserve, drain, reconfiguration and
//! metrics, driving the CAS loop and the park loop around the pure
//! `crate::algorithm::next` function.

use crate::algorithm::{next, NEVER_WAIT};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{Configuration, Outcome};
use crate::error::LimiterResult;
use crate::events::{DrainedEvent, EventDispatcher, FailureEvent, SuccessEvent};
use crate::state::State;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sentinel returned by [`RateLimiter::reserve`] when the request cannot be
/// granted within the caller's configured timeout.
pub const RESERVE_REFUSED: i64 = -1;

/// Upper bound on a single park slice; `acquire`'s reservation park re-checks
/// its deadline at least this often, which is also how often it notices a
/// [`CancelToken`] being signalled.
const MAX_PARK_SLICE: Duration = Duration::from_millis(50);

/// Backoff park after a failed CAS attempt. Purely a throughput hint (see
/// `SPEC_FULL.md` §9); correctness does not depend on its value.
const CAS_BACKOFF: Duration = Duration::from_nanos(1);

/// A handle a caller can use to interrupt its own in-progress
/// [`RateLimiter::acquire_cancellable`] wait — the Rust realization of
/// `SPEC_FULL.md` §4.3's `waiting → interrupted` transition. Cloning a
/// token shares the same underlying flag, so the owning thread can hand a
/// clone to whichever code path decides to cancel the wait.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent; has no effect if the wait this
    /// token guards has already completed.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel()` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A lock-free, single-atomic-cell token-bucket rate limiter.
///
/// Cheap to share: wrap in an `Arc` and clone the `Arc` across threads, or
/// call the `&self` methods directly since every operation here only needs
/// a shared reference.
pub struct RateLimiter {
    name: String,
    tags: HashMap<String, String>,
    state: ArcSwap<State>,
    clock: Arc<dyn Clock>,
    waiting_threads: AtomicUsize,
    events: EventDispatcher,
}

impl RateLimiter {
    /// Construct a limiter anchored to the process's monotonic clock.
    pub fn new(name: impl Into<String>, config: Configuration, tags: HashMap<String, String>) -> Self {
        Self::with_clock(name, config, tags, Arc::new(MonotonicClock::new()))
    }

    /// Construct a limiter against a caller-supplied clock — used by tests
    /// to pin exact cycle boundaries with a [`crate::clock::ManualClock`].
    pub fn with_clock(
        name: impl Into<String>,
        config: Configuration,
        tags: HashMap<String, String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            tags,
            state: ArcSwap::new(Arc::new(State::initial(config))),
            clock,
            waiting_threads: AtomicUsize::new(0),
            events: EventDispatcher::new(),
        }
    }

    /// This limiter's name, attached to every emitted event.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This limiter's observational tags.
    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// Register a handler invoked for every successful acquire/reserve.
    pub fn on_success(&self, handler: impl Fn(&SuccessEvent) + Send + Sync + 'static) {
        self.events.on_success(handler);
    }

    /// Register a handler invoked for every timed-out acquire/reserve.
    pub fn on_failure(&self, handler: impl Fn(&FailureEvent) + Send + Sync + 'static) {
        self.events.on_failure(handler);
    }

    /// Register a handler invoked for every `drain()`.
    pub fn on_drained(&self, handler: impl Fn(&DrainedEvent) + Send + Sync + 'static) {
        self.events.on_drained(handler);
    }

    /// Acquire `permits`, parking the calling thread if a wait is required
    /// and affordable within the configured timeout.
    ///
    /// Returns `true` if the permits were granted (immediately or after
    /// parking), `false` if they were refused. `permits` must be a positive
    /// integer.
    pub fn acquire(&self, permits: i64) -> bool {
        self.acquire_internal(permits, None)
    }

    /// Like [`RateLimiter::acquire`], but the wait can be interrupted early
    /// via `cancel`. On cancellation, `acquire_cancellable` returns `false`
    /// immediately and the reservation already taken is **not** refunded
    /// (`SPEC_FULL.md` §4.3/§5: `waiting → interrupted`).
    pub fn acquire_cancellable(&self, permits: i64, cancel: &CancelToken) -> bool {
        self.acquire_internal(permits, Some(cancel))
    }

    fn acquire_internal(&self, permits: i64, cancel: Option<&CancelToken>) -> bool {
        debug_assert!(permits >= 1, "permits must be a positive integer, got {permits}");
        let timeout_nanos = self.configured_timeout_nanos();
        let next_state = self.cas_advance(permits, timeout_nanos);

        if next_state.nanos_to_wait == 0 {
            self.events.publish_success(SuccessEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Granted);
            true
        } else if timeout_nanos >= 0 && timeout_nanos as u64 >= next_state.nanos_to_wait {
            if !self.park(next_state.nanos_to_wait, cancel) {
                tracing::debug!(limiter = %self.name, permits, "acquire interrupted; reservation not refunded");
                return false;
            }
            self.events.publish_success(SuccessEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Granted);
            true
        } else {
            self.park(timeout_nanos.max(0) as u64, cancel);
            self.events.publish_failure(FailureEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Refused);
            false
        }
    }

    /// Compute whether `permits` would be granted within the configured
    /// timeout without parking the calling thread.
    ///
    /// Returns `0` if immediately grantable, a positive nanosecond count the
    /// caller should wait, or [`RESERVE_REFUSED`] if the request cannot be
    /// granted within the timeout (no reservation is made in that case).
    /// `permits` must be a positive integer.
    pub fn reserve(&self, permits: i64) -> i64 {
        debug_assert!(permits >= 1, "permits must be a positive integer, got {permits}");
        let timeout_nanos = self.configured_timeout_nanos();
        let next_state = self.cas_advance(permits, timeout_nanos);

        if next_state.nanos_to_wait == 0 {
            self.events.publish_success(SuccessEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Granted);
            0
        } else if timeout_nanos >= 0 && timeout_nanos as u64 >= next_state.nanos_to_wait {
            self.events.publish_success(SuccessEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Granted);
            next_state.nanos_to_wait as i64
        } else {
            self.events.publish_failure(FailureEvent {
                limiter: self.name.clone(),
                permits,
            });
            self.maybe_drain(&next_state.config, Outcome::Refused);
            RESERVE_REFUSED
        }
    }

    /// Discard the currently available balance, lifting any reservation
    /// (negative balance) to zero. Returns the number of permits actually
    /// discarded (always >= 0).
    pub fn drain(&self) -> i64 {
        loop {
            let prev = self.state.load_full();
            let discarded = prev.active_permissions.max(0);
            let candidate = Arc::new(State {
                config: prev.config.clone(),
                active_cycle: prev.active_cycle,
                active_permissions: 0,
                nanos_to_wait: 0,
            });
            let witnessed = self.state.compare_and_swap(&prev, Arc::clone(&candidate));
            if Arc::ptr_eq(&*witnessed, &prev) {
                self.events.publish_drained(DrainedEvent {
                    limiter: self.name.clone(),
                    permits_discarded: discarded,
                });
                return discarded;
            }
            std::thread::sleep(CAS_BACKOFF);
        }
    }

    /// Install a new acquire timeout. Permit accounting is preserved; an
    /// in-flight reservation is not invalidated by this change.
    pub fn change_timeout(&self, timeout: Duration) {
        self.cas_reconfigure(|config| Ok(config.with_timeout(timeout)))
            .expect("with_timeout never fails");
    }

    /// Install a new permits-per-period limit. Permit accounting is
    /// preserved; the new limit applies from the next cycle advance onward.
    pub fn change_limit_for_period(&self, limit: i64) -> LimiterResult<()> {
        self.cas_reconfigure(|config| config.with_limit_per_period(limit))
    }

    /// Number of threads currently parked inside `acquire`.
    pub fn waiting_threads(&self) -> usize {
        self.waiting_threads.load(Ordering::Relaxed)
    }

    /// What `acquire(1)` would see right now, without mutating state.
    pub fn available_permissions(&self) -> i64 {
        self.simulate().active_permissions
    }

    /// What `acquire(1)`'s wait would be right now, without mutating state.
    pub fn nanos_to_wait_estimate(&self) -> u64 {
        self.simulate().nanos_to_wait
    }

    /// The cycle index `acquire(1)` would observe right now, without
    /// mutating state.
    pub fn current_cycle_estimate(&self) -> u64 {
        self.simulate().active_cycle
    }

    /// Simulate `next` with [`NEVER_WAIT`] so the computation can never take
    /// the reserving branch — this read is observation-only and never
    /// installs a snapshot (see `SPEC_FULL.md` §9).
    fn simulate(&self) -> State {
        let prev = self.state.load_full();
        let now = self.clock.now_nanos();
        next(&prev, 1, NEVER_WAIT, now)
    }

    fn configured_timeout_nanos(&self) -> i64 {
        let nanos = self.state.load().config.acquire_timeout_nanos();
        nanos.min(i64::MAX as u64) as i64
    }

    /// The CAS loop: read the current snapshot, compute the next one fresh
    /// from the *current* time on every attempt, and retry with a short
    /// backoff park on contention.
    fn cas_advance(&self, permits: i64, timeout_nanos: i64) -> Arc<State> {
        loop {
            let prev = self.state.load_full();
            let now = self.clock.now_nanos();
            let candidate = Arc::new(next(&prev, permits, timeout_nanos, now));
            let witnessed = self.state.compare_and_swap(&prev, Arc::clone(&candidate));
            if Arc::ptr_eq(&*witnessed, &prev) {
                return candidate;
            }
            std::thread::sleep(CAS_BACKOFF);
        }
    }

    fn cas_reconfigure(
        &self,
        mutate: impl Fn(&Configuration) -> LimiterResult<Configuration>,
    ) -> LimiterResult<()> {
        loop {
            let prev = self.state.load_full();
            let new_config = mutate(&prev.config)?;
            let candidate = Arc::new(State {
                config: new_config,
                active_cycle: prev.active_cycle,
                active_permissions: prev.active_permissions,
                nanos_to_wait: prev.nanos_to_wait,
            });
            let witnessed = self.state.compare_and_swap(&prev, Arc::clone(&candidate));
            if Arc::ptr_eq(&*witnessed, &prev) {
                return Ok(());
            }
            std::thread::sleep(CAS_BACKOFF);
        }
    }

    fn maybe_drain(&self, config: &Configuration, outcome: Outcome) {
        if config.should_drain(outcome) {
            self.drain();
        }
    }

    /// Park the calling thread for `nanos`, re-checking the deadline (and
    /// `cancel`, if given) in bounded slices rather than a single long sleep
    /// (see `SPEC_FULL.md` §4.3). `waiting_threads` brackets the whole park,
    /// including this refusal-path call from `acquire`'s last branch.
    ///
    /// Returns `true` if the full duration elapsed, `false` if `cancel` was
    /// signalled first.
    fn park(&self, nanos: u64, cancel: Option<&CancelToken>) -> bool {
        self.waiting_threads.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_nanos(nanos);
        let mut completed = true;
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                completed = false;
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(MAX_PARK_SLICE));
        }
        self.waiting_threads.fetch_sub(1, Ordering::SeqCst);
        completed
    }
}
