//! Wall-clock abstraction for deterministic testing.
//!
//! Expiration, read timestamps, and one-time-code windows are all wall-clock
//! driven, so the services take the clock as a collaborator instead of
//! calling the system time directly.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Source of wall-clock time in unix seconds.
///
/// # Invariants
///
/// Implementations must never go backwards within a single process.
pub trait Clock: Send + Sync + 'static {
    /// Seconds since the unix epoch.
    fn unix_seconds(&self) -> u64;
}

/// Production clock backed by the system time.
#[derive(Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            // A system clock before 1970 cannot drive expiration sanely;
            // treat it as epoch rather than panic.
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// Manually advanced clock for tests and simulation.
///
/// Clones share the same underlying time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given unix time.
    #[must_use]
    pub fn new(unix_seconds: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(unix_seconds)) }
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to an absolute unix time.
    pub fn set(&self, unix_seconds: u64) {
        self.now.store(unix_seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_seconds(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_epoch() {
        let clock = SystemClock::new();
        // 2020-01-01
        assert!(clock.unix_seconds() > 1_577_836_800);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.unix_seconds(), 1_000);

        clock.advance(30);
        assert_eq!(clock.unix_seconds(), 1_030);

        clock.set(2_000);
        assert_eq!(clock.unix_seconds(), 2_000);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let view = clock.clone();

        clock.advance(60);
        assert_eq!(view.unix_seconds(), 60);
    }
}
