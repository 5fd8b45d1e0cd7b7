//! Asynchronous event publication
//!
//! Mirrors the teacher's `AlertHandler` trait and `MemoryMonitor` background
//! thread: handlers never run on the caller's thread and never participate
//! in the limiter's CAS loop (see `SPEC_FULL.md` §9, "Event publishing must
//! never participate in the CAS"). Publication is fire-and-forget; a full
//! queue or a panicking handler can never block or poison `acquire`.

use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

/// Payload for a successful acquire/reserve.
#[derive(Debug, Clone)]
pub struct SuccessEvent {
    /// Name of the limiter that granted the permits.
    pub limiter: String,
    /// Number of permits granted.
    pub permits: i64,
}

/// Payload for a timed-out acquire/reserve.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    /// Name of the limiter that refused the permits.
    pub limiter: String,
    /// Number of permits that were requested.
    pub permits: i64,
}

/// Payload for a `drain()` call.
#[derive(Debug, Clone)]
pub struct DrainedEvent {
    /// Name of the drained limiter.
    pub limiter: String,
    /// Permits actually discarded (always >= 0; see `SPEC_FULL.md` §9 for
    /// the resolution of the original source's inverted payload).
    pub permits_discarded: i64,
}

enum QueuedEvent {
    Success(SuccessEvent),
    Failure(FailureEvent),
    Drained(DrainedEvent),
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    success: RwLock<Vec<Handler<SuccessEvent>>>,
    failure: RwLock<Vec<Handler<FailureEvent>>>,
    drained: RwLock<Vec<Handler<DrainedEvent>>>,
}

/// Publishes limiter events to registered handlers on a dedicated
/// background thread.
///
/// Dropping the last clone of the [`crate::limiter::RateLimiter`] that owns
/// this dispatcher drops the channel sender, the background thread's
/// `recv()` returns `Err`, and the thread exits — no explicit shutdown call
/// is required.
pub struct EventDispatcher {
    // `mpsc::Sender` is `Send` but not `Sync`; wrapping it is what lets
    // `EventDispatcher` (and so `RateLimiter`) be shared behind `&self`
    // across threads without forcing every caller to clone a sender.
    sender: RwLock<Sender<QueuedEvent>>,
    handlers: Arc<Handlers>,
}

impl EventDispatcher {
    /// Spawn the dispatcher's background worker thread.
    pub fn new() -> Self {
        let handlers = Arc::new(Handlers::default());
        let (sender, receiver) = mpsc::channel::<QueuedEvent>();

        let worker_handlers = Arc::clone(&handlers);
        thread::spawn(move || {
            while let Ok(event) = receiver.recv() {
                dispatch(&worker_handlers, event);
            }
        });

        Self {
            sender: RwLock::new(sender),
            handlers,
        }
    }

    /// Register a handler invoked for every successful acquire/reserve.
    pub fn on_success<F>(&self, handler: F)
    where
        F: Fn(&SuccessEvent) + Send + Sync + 'static,
    {
        self.handlers.success.write().push(Arc::new(handler));
    }

    /// Register a handler invoked for every timed-out acquire/reserve.
    pub fn on_failure<F>(&self, handler: F)
    where
        F: Fn(&FailureEvent) + Send + Sync + 'static,
    {
        self.handlers.failure.write().push(Arc::new(handler));
    }

    /// Register a handler invoked for every `drain()`.
    pub fn on_drained<F>(&self, handler: F)
    where
        F: Fn(&DrainedEvent) + Send + Sync + 'static,
    {
        self.handlers.drained.write().push(Arc::new(handler));
    }

    /// Enqueue a success event. Never blocks the caller beyond the cost of
    /// an unbounded channel send.
    pub fn publish_success(&self, event: SuccessEvent) {
        tracing::debug!(limiter = %event.limiter, permits = event.permits, "permits granted");
        let _ = self.sender.read().send(QueuedEvent::Success(event));
    }

    /// Enqueue a failure event.
    pub fn publish_failure(&self, event: FailureEvent) {
        tracing::warn!(limiter = %event.limiter, permits = event.permits, "permits refused");
        let _ = self.sender.read().send(QueuedEvent::Failure(event));
    }

    /// Enqueue a drained event.
    pub fn publish_drained(&self, event: DrainedEvent) {
        tracing::info!(limiter = %event.limiter, discarded = event.permits_discarded, "limiter drained");
        let _ = self.sender.read().send(QueuedEvent::Drained(event));
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(handlers: &Handlers, event: QueuedEvent) {
    match event {
        QueuedEvent::Success(payload) => {
            for handler in handlers.success.read().iter() {
                invoke_swallowing_panics(handler, &payload);
            }
        }
        QueuedEvent::Failure(payload) => {
            for handler in handlers.failure.read().iter() {
                invoke_swallowing_panics(handler, &payload);
            }
        }
        QueuedEvent::Drained(payload) => {
            for handler in handlers.drained.read().iter() {
                invoke_swallowing_panics(handler, &payload);
            }
        }
    }
}

/// A faulting handler must never take down the dispatch thread — this is
/// the Rust realization of `SPEC_FULL.md`'s `EventSinkFault`.
fn invoke_swallowing_panics<T>(handler: &Handler<T>, payload: &T) {
    let handler = AssertUnwindSafe(handler);
    if panic::catch_unwind(move || (handler.0)(payload)).is_err() {
        tracing::warn!("event handler panicked; fault swallowed at publication boundary");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn registered_handler_observes_published_event() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        dispatcher.on_success(move |event: &SuccessEvent| {
            assert_eq!(event.permits, 3);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.publish_success(SuccessEvent {
            limiter: "demo".into(),
            permits: 3,
        });

        wait_until(Duration::from_secs(1), || seen.load(Ordering::SeqCst) == 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_later_dispatch() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        dispatcher.on_drained(|_: &DrainedEvent| panic!("boom"));
        let seen_clone = Arc::clone(&seen);
        dispatcher.on_drained(move |_: &DrainedEvent| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.publish_drained(DrainedEvent {
            limiter: "demo".into(),
            permits_discarded: 4,
        });

        wait_until(Duration::from_secs(1), || seen.load(Ordering::SeqCst) == 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + timeout;
        while !condition() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }
}
