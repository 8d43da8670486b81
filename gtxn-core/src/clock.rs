//! Clock and transaction-ID services (spec §2, "Clock & ID Service").
//!
//! Per the design notes in spec §9 ("global singletons for metrics/caches:
//! replace with explicit Aggregator and an injected clock"), the engine
//! never reaches for `SystemTime::now()`/`Instant::now()` directly outside
//! this module -- every collaborator that needs time takes a `Clock` by
//! reference, which makes the retry/deadline state machines deterministically
//! testable with a `FakeClock`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock-ish time source used for document timestamps, plus a
/// monotonic instant source used for latency/deadline measurement. Kept as
/// one trait since every production collaborator backs both with the same
/// underlying clock; tests may want to drive them independently, which
/// `FakeClock` supports.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch, used for `createTimeMs` /
    /// `updatedAtMs` document fields.
    fn now_ms(&self) -> i64;

    /// A monotonic instant, used for measuring elapsed latency and
    /// comparing against operation deadlines. Must never go backwards.
    fn now_instant(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// A deterministic clock for tests: `now_ms()` starts at a fixed value and
/// advances only when `advance_ms` is called; `now_instant()` is real (the
/// retry loop's `tokio::time::sleep` needs a real monotonic clock to
/// interoperate with the runtime timer), but latency assertions in tests
/// should tolerate that rather than depend on exact values.
pub struct FakeClock {
    ms: AtomicI64,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        FakeClock {
            ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        self.ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.ms.load(Ordering::SeqCst)
    }

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance_ms(50);
        assert_eq!(clock.now_ms(), 1_050);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
