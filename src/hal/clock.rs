//! Desktop clock implementation using `std::time::Instant`.

use std::time::Instant;

use crate::traits::Clock;

/// Monotonic clock counting from its creation.
///
/// # Example
///
/// ```rust
/// use cake_layout::hal::StdClock;
/// use cake_layout::traits::Clock;
///
/// let clock = StdClock::new();
/// let start = clock.now_ms();
/// assert!(clock.now_ms() >= start);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    /// Creates a clock reading zero now.
    #[inline]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Wall-clock instant for a time on this clock.
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.epoch + std::time::Duration::from_millis(ms)
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
