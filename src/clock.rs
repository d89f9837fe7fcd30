//! Monotonic time abstraction so maintenance and timeout logic can be driven by a fake
//! clock in tests instead of wall time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A source of monotonic instants.
///
/// The dispatcher and maintenance loop never call `Instant::now()` directly; they go
/// through this trait so tests can advance time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;
}

/// The real clock, backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock whose value only moves when told to, for deterministic tests of
/// timeout and idle-reclamation logic.
///
/// `Instant` has no public constructor from an arbitrary offset, so `FakeClock` anchors
/// itself to a real `Instant` taken at construction time and tracks an offset in
/// nanoseconds on top of it.
pub struct FakeClock {
    anchor: Instant,
    offset_nanos: AtomicU64,
}

impl FakeClock {
    /// Creates a clock anchored to the real current instant, with zero elapsed offset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Advances the clock by `d`.
    pub fn advance(&self, d: Duration) {
        self.offset_nanos
            .fetch_add(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.anchor + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
