use std::hint;
use std::thread;
use std::time::Duration;

/// Progressive waiter for blocking push/pop loops.
///
/// Escalates through three stages: spin with PAUSE hints, yield to the OS
/// scheduler, then short timed sleeps that double toward a one-millisecond
/// ceiling. Pauses are monotonically non-decreasing across calls on the
/// same instance; blocking wrappers construct a fresh instance per call so
/// every wait starts cheap.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 pause hints max before yielding
    const YIELD_LIMIT: u32 = 10; // then start sleeping
    const SLEEP_CEILING: Duration = Duration::from_millis(1);

    /// Creates a new backoff instance.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Duration of the sleep the next [`snooze`](Self::snooze) would take,
    /// or `None` while still in the spin/yield stages.
    #[inline]
    pub fn next_sleep(&self) -> Option<Duration> {
        if self.step <= Self::YIELD_LIMIT {
            return None;
        }
        let exp = (self.step - Self::YIELD_LIMIT - 1).min(10);
        Some(Duration::from_micros(1 << exp).min(Self::SLEEP_CEILING))
    }

    /// Waits one stage: spin, yield, or sleep, depending on progression.
    #[inline]
    pub fn snooze(&mut self) {
        match self.next_sleep() {
            None if self.step <= Self::SPIN_LIMIT => {
                for _ in 0..(1u32 << self.step) {
                    hint::spin_loop();
                }
            }
            None => thread::yield_now(),
            Some(pause) => thread::sleep(pause),
        }
        self.step = self.step.saturating_add(1);
    }

    /// Like [`snooze`](Self::snooze), but never sleeps longer than `limit`.
    ///
    /// Used by the deadline variants: the overshoot past a deadline is
    /// bounded by the spin/yield stages, which are sub-microsecond.
    #[inline]
    pub fn snooze_within(&mut self, limit: Duration) {
        match self.next_sleep() {
            Some(pause) => {
                thread::sleep(pause.min(limit));
                self.step = self.step.saturating_add(1);
            }
            None => self.snooze(),
        }
    }

    /// Reset for the next wait cycle.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
