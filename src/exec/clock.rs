// src/exec/clock.rs

//! Resettable idle timer shared by the stream relays.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks the time since the last observed stream activity for one engine
/// operation.
///
/// One clock is created per operation and shared (via `Arc`) by all three
/// relays; the engine's watchdog polls [`ActivityClock::is_expired`] on a
/// coarse interval. `touch` uses an atomic max over a monotonic origin, so
/// concurrent touches from multiple relays only ever move the last-activity
/// point forward.
#[derive(Debug)]
pub struct ActivityClock {
    /// `None` disables expiry permanently.
    threshold: Option<Duration>,
    /// Monotonic origin; activity is recorded as milliseconds since this.
    origin: Instant,
    last_activity_ms: AtomicU64,
}

impl ActivityClock {
    /// A clock with the given idle threshold; `None` = unbounded.
    pub fn new(threshold: Option<Duration>) -> Self {
        Self {
            threshold,
            origin: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    /// A clock that never expires.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Record activity now. Safe to call concurrently from multiple relays.
    pub fn touch(&self) {
        let elapsed_ms = self.origin.elapsed().as_millis() as u64;
        self.last_activity_ms
            .fetch_max(elapsed_ms, Ordering::Relaxed);
    }

    /// Time since the last recorded activity (or since creation, if no
    /// activity has been recorded yet).
    pub fn idle_for(&self) -> Duration {
        let elapsed_ms = self.origin.elapsed().as_millis() as u64;
        let last_ms = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(elapsed_ms.saturating_sub(last_ms))
    }

    /// Whether the idle threshold has been exceeded. Always `false` for an
    /// unbounded clock.
    pub fn is_expired(&self) -> bool {
        match self.threshold {
            None => false,
            Some(threshold) => self.idle_for() >= threshold,
        }
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_clock_never_expires() {
        let clock = ActivityClock::unbounded();
        std::thread::sleep(Duration::from_millis(30));
        assert!(!clock.is_expired());
    }

    #[test]
    fn expires_after_threshold_without_activity() {
        let clock = ActivityClock::new(Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(40));
        assert!(clock.is_expired());
    }

    #[test]
    fn touch_defers_expiry() {
        let clock = ActivityClock::new(Some(Duration::from_millis(200)));
        std::thread::sleep(Duration::from_millis(50));
        clock.touch();
        assert!(!clock.is_expired());
        assert!(clock.idle_for() < Duration::from_millis(50));
    }
}
