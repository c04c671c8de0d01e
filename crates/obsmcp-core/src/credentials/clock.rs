//! Time source for credential expiry

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use chrono::Utc;

/// Whole-second clock used for `iat`/`nbf`/`exp` and expiry checks
pub trait Clock: Send + Sync {
    /// Current time as Unix seconds
    fn now_secs(&self) -> i64;
}

/// Monotonic clock anchored to the wall clock once, at construction
///
/// Readings advance with `Instant`, so a wall-clock step backwards never
/// makes an expired credential look valid again.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor: Instant,
    anchor_secs: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_secs: Utc::now().timestamp(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        self.anchor_secs + self.anchor.elapsed().as_secs() as i64
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(start_secs),
        }
    }

    /// Start at the current wall-clock second
    pub fn starting_now() -> Self {
        Self::new(SystemClock::new().now_secs())
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: i64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
