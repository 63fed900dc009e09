//! Time sources for the scheduler.
//!
//! Everything time-dependent goes through [`Clock`] so the scheduler can be
//! driven by a [`ManualClock`] in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source in microseconds since an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;

    /// Suspend the calling thread for about `duration`.
    fn sleep(&self, duration: Duration);

    /// Return at `deadline_us` exactly, without yielding the thread.
    fn spin_until(&self, deadline_us: u64);

    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn spin_until(&self, deadline_us: u64) {
        while self.now_us() < deadline_us {
            std::hint::spin_loop();
        }
    }
}

/// Clock that only moves when told to.
///
/// `sleep` and `spin_until` advance the clock instead of blocking.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        ManualClock {
            now_us: AtomicU64::new(start_us),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set_us(&self, now_us: u64) {
        self.now_us.store(now_us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn spin_until(&self, deadline_us: u64) {
        self.now_us.fetch_max(deadline_us, Ordering::SeqCst);
    }
}
