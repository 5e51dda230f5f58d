//! Cooperative single-threaded clock driving every tickable component.

use crate::model::TimestampMs;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A component driven by the simulation clock.
///
/// `tick` must run to completion without blocking; long operations are split
/// across ticks.
pub trait Tickable: Send + Sync {
    /// Advance the component to simulation time `now`.
    fn tick(&self, now: TimestampMs);
}

/// Cooperative clock: on every `advance`, registered components are ticked
/// in registration order.
///
/// `advance` is the only re-entry point of the simulation and must not be
/// called re-entrantly; a re-entrant call is refused and logged rather than
/// allowed to corrupt tick ordering.
pub struct Clock {
    tickables: Mutex<Vec<Arc<dyn Tickable>>>,
    now: AtomicU64,
    advancing: AtomicBool,
}

impl Clock {
    /// Create a clock at time zero with no components.
    pub fn new() -> Self {
        Self {
            tickables: Mutex::new(Vec::new()),
            now: AtomicU64::new(0),
            advancing: AtomicBool::new(false),
        }
    }

    /// Register a component. Components tick in registration order.
    pub fn register(&self, tickable: Arc<dyn Tickable>) {
        self.tickables.lock().expect("tickables lock").push(tickable);
    }

    /// The last time `advance` was called with.
    #[must_use]
    pub fn now(&self) -> TimestampMs {
        self.now.load(Ordering::Acquire)
    }

    /// Advance the simulation to `now`, ticking every registered component.
    ///
    /// Calls with a timestamp behind the current one are refused so that
    /// cross-tick event order stays monotone.
    pub fn advance(&self, now: TimestampMs) {
        if self
            .advancing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(now, "re-entrant clock advance refused");
            return;
        }
        if now < self.now.load(Ordering::Acquire) {
            warn!(now, current = self.now(), "non-monotone clock advance refused");
            self.advancing.store(false, Ordering::Release);
            return;
        }
        self.now.store(now, Ordering::Release);

        let components: Vec<Arc<dyn Tickable>> =
            self.tickables.lock().expect("tickables lock").clone();
        for component in components {
            component.tick(now);
        }
        self.advancing.store(false, Ordering::Release);
    }

    /// Run from `start` to `end` inclusive in `step` increments.
    pub fn run(&self, start: TimestampMs, end: TimestampMs, step: u64) {
        let step = step.max(1);
        let mut t = start;
        while t <= end {
            self.advance(t);
            t += step;
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
