//! Free-memory sampling used by the adaptive controller's safety floors.

use std::sync::atomic::{AtomicU64, Ordering};

use sysinfo::System;

/// A source of system memory pressure, expressed as percent free (0-100).
pub trait MemoryProbe: Send + Sync {
    /// Returns the percentage of total memory currently free, in `0.0..=100.0`.
    fn percent_free(&self) -> f64;
}

/// A `MemoryProbe` backed by `sysinfo`.
///
/// Refreshing the full `sysinfo::System` on every call is wasteful for a probe that may
/// be polled once per maintenance tick; this wrapper keeps a single `System` and only
/// refreshes the memory counters.
pub struct SysinfoMemoryProbe {
    system: parking_lot::Mutex<System>,
}

impl SysinfoMemoryProbe {
    /// Creates a probe with a freshly initialized `sysinfo::System`.
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: parking_lot::Mutex::new(system),
        }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn percent_free(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 100.0;
        }
        let free = system.available_memory();
        (free as f64 / total as f64) * 100.0
    }
}

/// A probe with a value set by the test, for deterministic adaptive-controller tests.
pub struct FakeMemoryProbe {
    percent_free_bp: AtomicU64,
}

impl FakeMemoryProbe {
    /// Creates a probe reporting `percent_free` until told otherwise.
    #[must_use]
    pub fn new(percent_free: f64) -> Self {
        Self {
            percent_free_bp: AtomicU64::new((percent_free * 100.0) as u64),
        }
    }

    /// Updates the reported free-memory percentage.
    pub fn set(&self, percent_free: f64) {
        self.percent_free_bp
            .store((percent_free * 100.0) as u64, Ordering::SeqCst);
    }
}

impl MemoryProbe for FakeMemoryProbe {
    fn percent_free(&self) -> f64 {
        self.percent_free_bp.load(Ordering::SeqCst) as f64 / 100.0
    }
}
