//! Pool configuration: the user-tunable knobs for worker count, timeouts, memory
//! floors, and logging verbosity.

use serde::{Deserialize, Serialize};

/// Upper bound on live workers: either a fixed count or `"auto"` (host CPU count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxWorkers {
    /// A fixed cap.
    Fixed(u32),
    /// Resolves to `num_cpus::get()` at pool construction.
    Auto,
}

impl MaxWorkers {
    /// Resolves to a concrete worker count.
    #[must_use]
    pub fn resolve(self) -> u32 {
        match self {
            MaxWorkers::Fixed(n) => n,
            MaxWorkers::Auto => num_cpus::get() as u32,
        }
    }
}

/// A workload preset that rewrites `idle_timeout_ms` unless the user set one
/// explicitly in the same `configure` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadProfile {
    /// Short-lived CPU-bound tasks: workers idle out quickly.
    Cpu,
    /// I/O-bound tasks: workers are kept warm longer.
    Io,
    /// A balance of both.
    Mixed,
}

impl WorkloadProfile {
    /// The idle timeout this profile prescribes, in milliseconds.
    #[must_use]
    pub fn idle_timeout_ms(self) -> u64 {
        match self {
            WorkloadProfile::Cpu => 2_000,
            WorkloadProfile::Io => 15_000,
            WorkloadProfile::Mixed => 5_000,
        }
    }
}

/// Verbosity filter for emitted tracing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// No events emitted.
    Off,
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Errors, warnings, and informational lifecycle events.
    Info,
    /// Verbose per-task tracing.
    Debug,
    /// Everything, including per-message auth checks.
    Trace,
}

impl LogLevel {
    /// The `tracing_subscriber::EnvFilter` directive this level corresponds to.
    #[must_use]
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// The full set of recognized pool options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Absolute upper bound on live workers.
    pub max_workers: MaxWorkers,
    /// Lower bound maintained after warm-up; never reclaimed for idleness.
    pub min_workers: u32,
    /// Milliseconds a worker may sit idle before reclamation.
    pub idle_timeout_ms: u64,
    /// Per-task deadline in milliseconds; 0 disables.
    pub task_timeout_ms: u64,
    /// If system memory usage exceeds this percentage, new worker spawning is
    /// refused. 0 disables the user limit (safety floors still apply).
    pub max_memory_percent: u8,
    /// A preset that rewrites `idle_timeout_ms`.
    pub workload: WorkloadProfile,
    /// Enables proactive spawning when queue depth exceeds a small threshold.
    pub adaptive: bool,
    /// Verbosity filter for emitted events.
    pub log_level: LogLevel,
    /// Whether `idle_timeout_ms` was explicitly set in this same `configure` call,
    /// rather than being whatever the previous configuration happened to hold.
    /// `PoolBuilder::idle_timeout_ms` sets this automatically; callers building a
    /// `PoolConfig` directly (bypassing the builder) must set it themselves to pin
    /// their timeout against a `workload` rewrite in the same call.
    #[serde(skip, default)]
    pub idle_timeout_overridden: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: MaxWorkers::Auto,
            min_workers: 1,
            idle_timeout_ms: 5_000,
            task_timeout_ms: 0,
            max_memory_percent: 0,
            workload: WorkloadProfile::Mixed,
            adaptive: false,
            log_level: LogLevel::Error,
            idle_timeout_overridden: false,
        }
    }
}

impl PoolConfig {
    /// Validates the configuration, returning a diagnostic string on failure.
    pub fn validate(&self) -> Result<(), String> {
        if let MaxWorkers::Fixed(n) = self.max_workers {
            if n == 0 {
                return Err("max_workers must be greater than 0".into());
            }
            if self.min_workers > n {
                return Err("min_workers cannot exceed max_workers".into());
            }
        }
        if self.max_memory_percent > 100 {
            return Err("max_memory_percent must be between 0 and 100".into());
        }
        Ok(())
    }

    /// Applies the workload profile's idle timeout, unless the user has overridden it.
    pub(crate) fn apply_workload_profile(&mut self) {
        if !self.idle_timeout_overridden {
            self.idle_timeout_ms = self.workload.idle_timeout_ms();
        }
    }
}
