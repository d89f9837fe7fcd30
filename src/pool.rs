//! The single public entry point: submit work, tune configuration, and observe or
//! tear down a running pool.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::builders::PoolBuilder;
use crate::clock::{Clock, SystemClock};
use crate::codec::{PassthroughCodec, PayloadCodec};
use crate::config::PoolConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{PoolError, TaskError};
use crate::executor::Executor;
use crate::maintenance::{MaintenanceLoop, DEFAULT_TICK_PERIOD};
use crate::memory_probe::{MemoryProbe, SysinfoMemoryProbe};
use crate::stats::{Health, HealthStatus, Stats};
use crate::task::{Outcome, TaskOptions};

/// Percentage of free memory below which the pool reports itself `pressured`.
///
/// This mirrors the dispatcher's own 15%-floor threshold (§4.4): once the system is
/// tight enough to clamp `effective_max`, the pool's health should already say so.
const PRESSURE_FREE_PERCENT_FLOOR: f64 = 15.0;

/// A cooperative worker-pool runtime. Submits tasks to a managed set of isolated
/// worker threads, each running the same `Executor`, and reports back typed
/// outcomes, aggregate stats, and health.
///
/// `Pool` is generic over the `Executor` that runs task payloads and, optionally, a
/// `PayloadCodec` used only for the pre-submit `encodable` check (it defaults to
/// [`PassthroughCodec`], which accepts anything non-empty).
pub struct Pool<E: Executor, C: PayloadCodec = PassthroughCodec> {
    dispatcher: Arc<Dispatcher<E>>,
    maintenance: MaintenanceLoop,
    codec: C,
    memory_probe: Arc<dyn MemoryProbe>,
    max_memory_percent_for_health: u8,
}

impl<E: Executor> Pool<E, PassthroughCodec> {
    /// Constructs a pool with the given configuration and executor, using the
    /// default pass-through codec.
    #[must_use]
    pub fn new(config: PoolConfig, executor: E) -> Self {
        Self::with_codec(config, executor, PassthroughCodec)
    }

    /// Starts building a pool option-by-option.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }
}

impl<E: Executor, C: PayloadCodec> Pool<E, C> {
    /// Constructs a pool with an explicit codec, for callers that validate payloads
    /// beyond a simple non-empty check.
    #[must_use]
    pub fn with_codec(config: PoolConfig, executor: E, codec: C) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let memory_probe: Arc<dyn MemoryProbe> = Arc::new(SysinfoMemoryProbe::new());
        Self::with_collaborators(config, executor, codec, clock, memory_probe)
    }

    /// Constructs a pool with injectable `Clock`/`MemoryProbe` implementations, for
    /// deterministic tests of timeout, reclamation, and memory-pressure behavior.
    #[must_use]
    pub fn with_collaborators(
        config: PoolConfig,
        executor: E,
        codec: C,
        clock: Arc<dyn Clock>,
        memory_probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        crate::telemetry::init_tracing(config.log_level);
        let max_memory_percent_for_health = config.max_memory_percent;
        let dispatcher = Dispatcher::new(config, Arc::new(executor), Arc::clone(&clock), Arc::clone(&memory_probe));
        let maintenance = MaintenanceLoop::spawn(Arc::clone(&dispatcher), DEFAULT_TICK_PERIOD);
        Self {
            dispatcher,
            maintenance,
            codec,
            memory_probe,
            max_memory_percent_for_health,
        }
    }

    /// Submits one task. Never blocks on worker capacity; returns immediately with a
    /// handle that resolves once the task settles.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolClosed` if the pool is shutting down, or
    /// `PoolError::InvalidPayload` if `payload` fails the codec's `encodable` check.
    pub fn submit(&self, payload: Vec<u8>, options: TaskOptions) -> Result<TaskHandle, PoolError> {
        if !self.codec.encodable(&payload) {
            return Err(PoolError::InvalidPayload(
                "payload rejected by codec's encodable check".into(),
            ));
        }
        match self.dispatcher.submit(payload, options) {
            Ok(waiter) => Ok(TaskHandle { waiter }),
            Err(TaskError::PoolClosed) => Err(PoolError::PoolClosed),
            Err(other) => {
                // submit() only ever returns PoolClosed synchronously; any other
                // TaskError would indicate a logic error in the dispatcher.
                warn!(error = %other, "unexpected synchronous submit error");
                Err(PoolError::PoolClosed)
            }
        }
    }

    /// Submits a batch of payloads, preserving order in the returned results. On a
    /// per-element failure, that element's outcome is `Err`; the batch does not
    /// short-circuit. Applies the once-per-batch idle-timeout heuristic.
    pub async fn submit_many(&self, payloads: Vec<Vec<u8>>) -> Vec<Outcome> {
        self.dispatcher.adjust_idle_timeout_for_batch(payloads.len());

        let mut handles = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match self.submit(payload, TaskOptions::default()) {
                Ok(handle) => handles.push(Ok(handle)),
                Err(e) => handles.push(Err(e)),
            }
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Ok(handle) => outcomes.push(handle.wait().await),
                Err(PoolError::PoolClosed) => outcomes.push(Err(TaskError::PoolClosed)),
                Err(PoolError::InvalidPayload(msg)) => outcomes.push(Err(TaskError::InvalidPayload(msg))),
                Err(PoolError::InvalidConfig(msg)) => outcomes.push(Err(TaskError::InvalidPayload(msg))),
            }
        }
        outcomes
    }

    /// Mutates the pool configuration atomically. Raising `max_workers` takes effect
    /// immediately; lowering it never kills existing workers, which drain naturally.
    /// Changing `workload` rewrites `idle_timeout_ms` unless this same call also set
    /// it explicitly.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the new configuration fails validation.
    pub fn configure(&self, config: PoolConfig) -> Result<(), PoolError> {
        let overridden = config.idle_timeout_overridden;
        self.dispatcher
            .configure(config, overridden)
            .map_err(PoolError::InvalidConfig)
    }

    /// A snapshot of the pool's current configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.dispatcher.config_snapshot()
    }

    /// A point-in-time snapshot of pool activity.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.dispatcher.stats()
    }

    /// Current health: `Pressured` when `MemoryProbe` reports free memory below the
    /// configured safety floor.
    #[must_use]
    pub fn health(&self) -> Health {
        let free_percent = self.memory_probe.percent_free();
        let memory_usage_percent = 100.0 - free_percent;
        let user_floor_breached = self.max_memory_percent_for_health > 0
            && memory_usage_percent >= f64::from(self.max_memory_percent_for_health);
        let status = if free_percent < PRESSURE_FREE_PERCENT_FLOOR || user_floor_breached {
            HealthStatus::Pressured
        } else {
            HealthStatus::Healthy
        };
        Health {
            status,
            live_workers: self.dispatcher.live_workers(),
            memory_usage_percent,
        }
    }

    /// Transitions the pool to closing: new submissions fail immediately; in-flight
    /// tasks continue until they settle or `timeout` elapses, whichever comes first.
    /// Any tasks still pending at that point are settled with `PoolClosed` and every
    /// worker is terminated.
    pub fn shutdown(&mut self, timeout_ms: u64) {
        self.maintenance.stop();
        self.dispatcher.shutdown(Duration::from_millis(timeout_ms));
    }
}

/// The future-like handle returned from [`Pool::submit`].
pub struct TaskHandle {
    waiter: crate::task::ResultWaiter,
}

impl TaskHandle {
    /// Awaits the task's outcome.
    pub async fn wait(self) -> Outcome {
        self.waiter.wait().await
    }

    /// Blocks the current thread until the outcome arrives.
    pub fn wait_blocking(self) -> Outcome {
        self.waiter.wait_blocking()
    }
}
