//! # Throttlegate
//!
//! A lock-free, single-atomic-cell token-bucket rate limiter for
//! high-concurrency in-process use. This crate provides a façade
//! ([`RateLimiter`]) over a pure next-state function, coordinated entirely
//! through a single compare-and-swap on an immutable snapshot — no mutex, no
//! sharded atomics, no cooperative/async assumption.
//!
//! ## Features
//!
//! - **Lock-Free Operation**: every state transition is a single CAS on one
//!   `Arc<State>` cell; readers never observe a torn combination of config
//!   and permit accounting.
//! - **Deterministic Core**: [`algorithm::next`] is a pure function of
//!   `(prev, permits, timeout, now)` — easy to test exhaustively without
//!   real concurrency or real time.
//! - **Reservation Semantics**: callers willing to wait can pre-reserve
//!   permits against a future cycle; the balance may go negative to record
//!   that debt.
//! - **Live Reconfiguration**: timeout and limit-per-period can be changed
//!   on a running limiter without losing in-flight permit accounting.
//! - **Fire-and-Forget Events**: success/failure/drain notifications are
//!   dispatched on a dedicated background thread and never participate in
//!   the CAS loop.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────┐   cas_advance    ┌─────────────────┐
//! │  acquire /    ├─────────────────►│  ArcSwap<State> │
//! │  reserve      │◄─────────────────┤  (config, cycle,│
//! └───────┬───────┘   witnessed Arc  │   permits, wait)│
//!         │                          └─────────────────┘
//!         │ publish_success/failure/drained
//!         ▼
//! ┌───────────────┐   mpsc channel   ┌─────────────────┐
//! │ EventDispatcher├────────────────►│ background thread│
//! └───────────────┘                  │ invokes handlers │
//!                                    └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use throttlegate::{Configuration, RateLimiter};
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! let config = Configuration::builder()
//!     .limit_per_period(10)
//!     .refresh_period(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! let limiter = RateLimiter::new("api-gateway", config, HashMap::new());
//! if limiter.acquire(1) {
//!     // proceed with the rate-limited operation
//! }
//! ```
//!
//! ### Observing outcomes
//!
//! ```rust
//! use throttlegate::{Configuration, RateLimiter};
//! use std::collections::HashMap;
//!
//! let config = Configuration::builder().build().unwrap();
//! let limiter = RateLimiter::new("demo", config, HashMap::new());
//!
//! limiter.on_failure(|event| {
//!     eprintln!("refused {} permits on {}", event.permits, event.limiter);
//! });
//! ```
//!
//! ## Error Handling
//!
//! Only configuration construction can fail, via [`LimiterError`]. Runtime
//! capacity exhaustion is never an error — it is reported through the
//! return values of [`RateLimiter::acquire`] and [`RateLimiter::reserve`].
//!
//! ## Thread Safety
//!
//! - **RateLimiter**: thread-safe; every method takes `&self`. Share via
//!   `Arc<RateLimiter>` across threads.
//! - **Configuration**: an immutable value type, `Clone + Send + Sync`.
//! - **Clock**: implementors must be `Send + Sync`; [`MonotonicClock`] is the
//!   production default, [`ManualClock`] drives deterministic tests.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod state;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Configuration, ConfigurationBuilder, DrainPredicate, Outcome};
pub use error::{LimiterError, LimiterResult};
pub use events::{DrainedEvent, FailureEvent, SuccessEvent};
pub use limiter::{CancelToken, RateLimiter, RESERVE_REFUSED};
pub use state::State;

/// Initialize tracing for low-overhead structured logging.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
