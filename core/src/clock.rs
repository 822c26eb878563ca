//! Microsecond time sources for layer and session statistics.
//!
//! Timing is only ever reported, never used for scheduling, so the engine
//! takes any [`Clock`] and tests can substitute a deterministic one.

use core::cell::Cell;

pub trait Clock {
    /// Monotonic time in microseconds from an arbitrary origin.
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Wall clock backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self { origin: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// A clock that advances by a fixed step every time it is read.
///
/// With `step = 0` it only moves through [`ManualClock::advance`].
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    step: u64,
}

impl ManualClock {
    pub fn new(step: u64) -> Self {
        Self { now: Cell::new(0), step }
    }

    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }

    /// Current reading without advancing.
    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }
}
