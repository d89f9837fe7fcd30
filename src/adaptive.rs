//! Memory-pressure and backlog-driven capacity control.

use crate::config::PoolConfig;
use crate::memory_probe::MemoryProbe;

/// Minimum queue depth, above which `adaptive` mode will attempt a proactive spawn.
const PROACTIVE_SPAWN_QUEUE_THRESHOLD: usize = 3;

/// Batch size above which the idle timeout is relaxed after a batch submission.
const LARGE_BATCH_THRESHOLD: usize = 50;
/// Batch size below which the idle timeout is tightened after a batch submission.
const SMALL_BATCH_THRESHOLD: usize = 5;

const IDLE_TIMEOUT_CEILING_MS: u64 = 30_000;
const IDLE_TIMEOUT_FLOOR_MS: u64 = 2_000;

/// Computes the dynamically adjusted worker bound and proactive-spawn/backoff
/// decisions the dispatcher and maintenance loop consult on every tick.
pub struct AdaptiveController;

impl AdaptiveController {
    /// Computes `effective_max`: the live-worker ceiling after applying the
    /// hard-coded memory safety floors and the user's `max_memory_percent` cap.
    ///
    /// - free memory < 5% -> 1
    /// - 5% <= free memory < 15% -> `floor(0.7 * max_workers)`
    /// - otherwise -> `max_workers`
    ///
    /// The result is further capped so memory usage above `max_memory_percent` (when
    /// set) blocks growth without killing existing workers; callers enforce that by
    /// skipping spawn, not by lowering `effective_max` below current `live_workers`.
    #[must_use]
    pub fn effective_max(probe: &dyn MemoryProbe, config: &PoolConfig) -> u32 {
        let max_workers = config.max_workers.resolve();
        let free_percent = probe.percent_free();

        let floor_clamped = if free_percent < 5.0 {
            1
        } else if free_percent < 15.0 {
            ((f64::from(max_workers)) * 0.7).floor() as u32
        } else {
            max_workers
        };

        floor_clamped.min(max_workers)
    }

    /// True when the memory-usage percentage has crossed the user's configured
    /// `max_memory_percent` ceiling, blocking *new* worker creation (existing workers
    /// keep running). A `max_memory_percent` of 0 disables the user limit.
    #[must_use]
    pub fn memory_blocked(probe: &dyn MemoryProbe, config: &PoolConfig) -> bool {
        if config.max_memory_percent == 0 {
            return false;
        }
        let used_percent = 100.0 - probe.percent_free();
        used_percent >= f64::from(config.max_memory_percent)
    }

    /// Whether a proactive spawn should be attempted this tick: adaptive mode is on,
    /// the backlog exceeds the threshold, there is still headroom under
    /// `effective_max`, and memory pressure isn't blocking new worker creation.
    #[must_use]
    pub fn should_proactively_spawn(
        config: &PoolConfig,
        queue_len: usize,
        live_workers: u32,
        effective_max: u32,
        memory_blocked: bool,
    ) -> bool {
        config.adaptive
            && queue_len > PROACTIVE_SPAWN_QUEUE_THRESHOLD
            && live_workers < effective_max
            && !memory_blocked
    }

    /// Applies the once-per-batch idle-timeout heuristic: large batches relax the
    /// timeout (workers stay warm for more incoming work), small batches tighten it.
    /// A no-op if the user has pinned `idle_timeout_ms` via an explicit override.
    pub fn adjust_idle_timeout_for_batch(config: &mut PoolConfig, batch_size: usize) {
        if config.idle_timeout_overridden {
            return;
        }
        if batch_size > LARGE_BATCH_THRESHOLD {
            config.idle_timeout_ms =
                ((config.idle_timeout_ms as f64) * 1.5).round() as u64;
            config.idle_timeout_ms = config.idle_timeout_ms.min(IDLE_TIMEOUT_CEILING_MS);
        } else if batch_size < SMALL_BATCH_THRESHOLD {
            config.idle_timeout_ms =
                ((config.idle_timeout_ms as f64) * 0.8).round() as u64;
            config.idle_timeout_ms = config.idle_timeout_ms.max(IDLE_TIMEOUT_FLOOR_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxWorkers;
    use crate::memory_probe::FakeMemoryProbe;

    fn config(max_workers: u32) -> PoolConfig {
        PoolConfig {
            max_workers: MaxWorkers::Fixed(max_workers),
            ..PoolConfig::default()
        }
    }

    #[test]
    fn floor_below_five_percent_clamps_to_one() {
        let probe = FakeMemoryProbe::new(3.0);
        assert_eq!(AdaptiveController::effective_max(&probe, &config(8)), 1);
    }

    #[test]
    fn floor_between_five_and_fifteen_percent() {
        let probe = FakeMemoryProbe::new(10.0);
        assert_eq!(AdaptiveController::effective_max(&probe, &config(10)), 7);
    }

    #[test]
    fn no_floor_above_fifteen_percent() {
        let probe = FakeMemoryProbe::new(50.0);
        assert_eq!(AdaptiveController::effective_max(&probe, &config(8)), 8);
    }

    #[test]
    fn memory_blocked_respects_user_cap() {
        let probe = FakeMemoryProbe::new(10.0); // 90% used
        let mut cfg = config(8);
        cfg.max_memory_percent = 80;
        assert!(AdaptiveController::memory_blocked(&probe, &cfg));
        cfg.max_memory_percent = 0;
        assert!(!AdaptiveController::memory_blocked(&probe, &cfg));
    }

    #[test]
    fn proactive_spawn_respects_backlog_and_headroom() {
        let mut cfg = config(8);
        cfg.adaptive = true;
        assert!(AdaptiveController::should_proactively_spawn(&cfg, 4, 2, 8, false));
        assert!(!AdaptiveController::should_proactively_spawn(&cfg, 2, 2, 8, false), "backlog below threshold");
        assert!(!AdaptiveController::should_proactively_spawn(&cfg, 4, 8, 8, false), "no headroom under effective_max");
        cfg.adaptive = false;
        assert!(!AdaptiveController::should_proactively_spawn(&cfg, 4, 2, 8, false), "adaptive mode off");
    }

    #[test]
    fn proactive_spawn_blocked_by_memory_pressure() {
        let mut cfg = config(8);
        cfg.adaptive = true;
        assert!(!AdaptiveController::should_proactively_spawn(&cfg, 4, 2, 8, true));
    }

    #[test]
    fn large_batch_relaxes_idle_timeout() {
        let mut cfg = PoolConfig {
            idle_timeout_ms: 5_000,
            ..PoolConfig::default()
        };
        AdaptiveController::adjust_idle_timeout_for_batch(&mut cfg, 100);
        assert_eq!(cfg.idle_timeout_ms, 7_500);
    }

    #[test]
    fn small_batch_tightens_idle_timeout() {
        let mut cfg = PoolConfig {
            idle_timeout_ms: 5_000,
            ..PoolConfig::default()
        };
        AdaptiveController::adjust_idle_timeout_for_batch(&mut cfg, 2);
        assert_eq!(cfg.idle_timeout_ms, 4_000);
    }

    #[test]
    fn override_prevents_batch_adjustment() {
        let mut cfg = PoolConfig {
            idle_timeout_ms: 5_000,
            idle_timeout_overridden: true,
            ..PoolConfig::default()
        };
        AdaptiveController::adjust_idle_timeout_for_batch(&mut cfg, 100);
        assert_eq!(cfg.idle_timeout_ms, 5_000);
    }
}
