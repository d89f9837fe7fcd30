//! Fluent builder for [`crate::Pool`].

use crate::config::{LogLevel, MaxWorkers, PoolConfig, WorkloadProfile};
use crate::executor::Executor;
use crate::pool::Pool;

/// Builds a [`Pool`] option-by-option instead of constructing a [`PoolConfig`] by hand.
///
/// ```rust,ignore
/// use workpool::{PoolBuilder, Executor};
///
/// let pool = PoolBuilder::new()
///     .max_workers(4)
///     .min_workers(1)
///     .adaptive(true)
///     .build(my_executor);
/// ```
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    /// Starts from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Sets a fixed worker cap.
    #[must_use]
    pub fn max_workers(mut self, n: u32) -> Self {
        self.config.max_workers = MaxWorkers::Fixed(n);
        self
    }

    /// Uses the host CPU count as the worker cap.
    #[must_use]
    pub fn max_workers_auto(mut self) -> Self {
        self.config.max_workers = MaxWorkers::Auto;
        self
    }

    /// Sets the minimum number of workers kept warm.
    #[must_use]
    pub fn min_workers(mut self, n: u32) -> Self {
        self.config.min_workers = n;
        self
    }

    /// Overrides the idle timeout, pinning it against later workload-profile rewrites.
    #[must_use]
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self.config.idle_timeout_overridden = true;
        self
    }

    /// Sets the per-task deadline; 0 disables it.
    #[must_use]
    pub fn task_timeout_ms(mut self, ms: u64) -> Self {
        self.config.task_timeout_ms = ms;
        self
    }

    /// Sets the memory-usage percentage above which new worker creation is refused.
    #[must_use]
    pub fn max_memory_percent(mut self, percent: u8) -> Self {
        self.config.max_memory_percent = percent;
        self
    }

    /// Selects a workload preset, rewriting `idle_timeout_ms` unless already
    /// overridden via [`Self::idle_timeout_ms`].
    #[must_use]
    pub fn workload(mut self, profile: WorkloadProfile) -> Self {
        self.config.workload = profile;
        self
    }

    /// Enables proactive spawning under backlog pressure.
    #[must_use]
    pub fn adaptive(mut self, enabled: bool) -> Self {
        self.config.adaptive = enabled;
        self
    }

    /// Sets the emitted event verbosity.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Builds the pool, spawning `min_workers` workers immediately and starting its
    /// maintenance thread.
    pub fn build<E: Executor>(mut self, executor: E) -> Pool<E> {
        self.config.apply_workload_profile();
        Pool::new(self.config, executor)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
