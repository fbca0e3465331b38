use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::platform::sys;

/// A source of heartbeat timestamps.
///
/// Every process of a group compares its own `now_ms` against timestamps
/// written by its peers, so implementations must share an epoch across
/// processes on the same host.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current timestamp in milliseconds.
    fn now_ms(&self) -> i64;
}

/// `CLOCK_MONOTONIC`, which is host-wide and never jumps with NTP adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        sys::monotonic_ms()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
