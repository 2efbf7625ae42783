//! `std`-backed clock and delay.
//!
//! Used by the Raspberry Pi binary; they do not depend on any GPIO crate.

use std::thread;
use std::time::{Duration, Instant};

use crate::traits::{Clock, Delay};

/// Monotonic clock counting milliseconds since it was created.
///
/// `Copy`, so it can be moved into interrupt callbacks while the original
/// keeps the same epoch.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Delay backed by [`std::thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
