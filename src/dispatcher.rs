//! Pairs ready workers with pending tasks and routes worker completions back to their
//! sinks. This is the only piece of the control plane every other component reaches
//! through; a single `parking_lot::Mutex` guards `WorkerRegistry` + `TaskTable` +
//! `TaskQueue`'s shape, and no call into `Executor` code ever happens while it is held.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::adaptive::AdaptiveController;
use crate::clock::Clock;
use crate::config::PoolConfig;
use crate::error::TaskError;
use crate::executor::Executor;
use crate::memory_probe::MemoryProbe;
use crate::registry::WorkerRegistry;
use crate::stats::{Stats, StatsCounters};
use crate::task::{result_channel, Outcome, QueuedTask, ResultWaiter, TaskId, TaskOptions};
use crate::task_table::TaskTable;
use crate::task_queue::TaskQueue;
use crate::worker::{AuthToken, WorkerEvent, WorkerHandle};

const DEFAULT_WORKER_STACK_SIZE: usize = 2 * 1024 * 1024;

/// The `WorkerRegistry` + `TaskTable` + `TaskQueue` guarded as one unit.
struct DispatcherState {
    registry: WorkerRegistry,
    table: TaskTable,
    queue: TaskQueue,
    config: PoolConfig,
}

/// The pool's control plane: worker lifecycle, task admission, and dispatch.
pub struct Dispatcher<E: Executor> {
    executor: Arc<E>,
    auth_token: AuthToken,
    worker_id_counter: AtomicU64,
    task_id_counter: AtomicU64,
    state: Mutex<DispatcherState>,
    clock: Arc<dyn Clock>,
    memory_probe: Arc<dyn MemoryProbe>,
    event_tx: Sender<WorkerEvent>,
    stack_size: usize,
    stats: Arc<StatsCounters>,
    closing: AtomicBool,
    router_handle: Mutex<Option<JoinHandle<()>>>,
}

fn generate_auth_token() -> AuthToken {
    let mut token = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut token);
    token
}

impl<E: Executor> Dispatcher<E> {
    /// Builds the dispatcher, spawns `min_workers` initial workers, and starts the
    /// background thread that routes worker completions and exits back into state.
    pub fn new(
        config: PoolConfig,
        executor: Arc<E>,
        clock: Arc<dyn Clock>,
        memory_probe: Arc<dyn MemoryProbe>,
    ) -> Arc<Self> {
        let (event_tx, event_rx) = unbounded::<WorkerEvent>();

        let dispatcher = Arc::new(Self {
            executor,
            auth_token: generate_auth_token(),
            worker_id_counter: AtomicU64::new(0),
            task_id_counter: AtomicU64::new(0),
            state: Mutex::new(DispatcherState {
                registry: WorkerRegistry::new(),
                table: TaskTable::new(),
                queue: TaskQueue::new(),
                config,
            }),
            clock,
            memory_probe,
            event_tx,
            stack_size: DEFAULT_WORKER_STACK_SIZE,
            stats: Arc::new(StatsCounters::new()),
            closing: AtomicBool::new(false),
            router_handle: Mutex::new(None),
        });

        {
            let mut state = dispatcher.state.lock();
            let min_workers = state.config.min_workers;
            for _ in 0..min_workers {
                dispatcher.spawn_worker_locked(&mut state);
            }
        }

        let router_dispatcher = Arc::clone(&dispatcher);
        let handle = std::thread::Builder::new()
            .name("workpool-router".into())
            .spawn(move || {
                while let Ok(event) = event_rx.recv() {
                    router_dispatcher.handle_event(event);
                }
            })
            .expect("failed to spawn router thread");
        *dispatcher.router_handle.lock() = Some(handle);

        dispatcher
    }

    /// Admits a task: dispatches it to an idle worker, spawns a fresh worker if
    /// capacity allows, or enqueues it (the exact algorithm this component is named
    /// for). Never blocks on worker availability.
    pub fn submit(&self, payload: Vec<u8>, options: TaskOptions) -> Result<ResultWaiter, TaskError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(TaskError::PoolClosed);
        }

        let id = self.task_id_counter.fetch_add(1, Ordering::Relaxed);
        let (sink, waiter) = result_channel();
        let now = self.clock.now();

        let mut state = self.state.lock();
        let deadline = Self::deadline_for(&state.config, options, now);
        state.table.insert(id, sink, now, deadline);

        if let Some(worker_id) = state.registry.pick_idle() {
            state.registry.mark_busy(worker_id, id);
            state.table.assign(id, worker_id);
            if let Some(entry) = state.registry.get(worker_id) {
                entry.handle.post(id, payload, self.auth_token);
            }
            return Ok(waiter);
        }

        let live_workers = state.registry.len() as u32;
        let effective_max = AdaptiveController::effective_max(self.memory_probe.as_ref(), &state.config);
        let blocked = AdaptiveController::memory_blocked(self.memory_probe.as_ref(), &state.config);

        if live_workers < effective_max && !blocked {
            let worker_id = self.spawn_worker_locked(&mut state);
            state.registry.mark_busy(worker_id, id);
            state.table.assign(id, worker_id);
            if let Some(entry) = state.registry.get(worker_id) {
                entry.handle.post(id, payload, self.auth_token);
            }
            return Ok(waiter);
        }

        state.queue.push(QueuedTask { id, payload, options });
        Ok(waiter)
    }

    fn deadline_for(config: &PoolConfig, options: TaskOptions, now: Instant) -> Option<Instant> {
        let timeout_ms = options.timeout_override_ms.unwrap_or(config.task_timeout_ms);
        if timeout_ms == 0 {
            None
        } else {
            Some(now + Duration::from_millis(timeout_ms))
        }
    }

    fn spawn_worker_locked(&self, state: &mut DispatcherState) -> u64 {
        let worker_id = self.worker_id_counter.fetch_add(1, Ordering::Relaxed);
        let handle = WorkerHandle::start(
            worker_id,
            Arc::clone(&self.executor),
            self.auth_token,
            self.event_tx.clone(),
            self.stack_size,
        );
        let now = self.clock.now();
        state.registry.insert(worker_id, handle, now);
        info!(worker_id, "worker spawned");
        worker_id
    }

    fn handle_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Completed { worker_id, task_id, outcome } => {
                self.handle_completion(worker_id, task_id, outcome);
            }
            WorkerEvent::Exited { worker_id } => self.handle_exit(worker_id),
        }
    }

    fn handle_completion(&self, worker_id: u64, task_id: TaskId, outcome: Outcome) {
        let now = self.clock.now();
        let removed = {
            let mut state = self.state.lock();
            let removed = state.table.remove_with_meta(task_id);
            state.registry.mark_idle(worker_id, now);
            removed
        };

        if let Some((sink, meta)) = removed {
            let duration = now.saturating_duration_since(meta.submit_time);
            match &outcome {
                Ok(_) => self.stats.record_success(duration, now),
                Err(_) => self.stats.record_failure(duration, now),
            }
            sink.settle(outcome);
        }

        self.drain_queue();
    }

    fn handle_exit(&self, worker_id: u64) {
        let (assigned_sinks, was_registered) = {
            let mut state = self.state.lock();
            let assigned_task_ids = state.table.assigned_to(worker_id);
            let mut sinks = Vec::with_capacity(assigned_task_ids.len());
            for task_id in assigned_task_ids {
                if let Some(sink) = state.table.remove(task_id) {
                    sinks.push(sink);
                }
            }
            let was_registered = state.registry.remove(worker_id).is_some();
            (sinks, was_registered)
        };

        if was_registered {
            warn!(worker_id, "worker exited unexpectedly, settling its tasks as crashed");
        }
        for sink in assigned_sinks {
            sink.settle(Err(TaskError::WorkerCrashed));
        }

        self.drain_queue();
    }

    /// Assigns queued tasks to idle workers until either runs out.
    pub fn drain_queue(&self) {
        let mut state = self.state.lock();
        loop {
            let Some(worker_id) = state.registry.pick_idle() else {
                break;
            };
            let Some(queued) = state.queue.pop() else {
                break;
            };
            state.registry.mark_busy(worker_id, queued.id);
            state.table.assign(queued.id, worker_id);
            if let Some(entry) = state.registry.get(worker_id) {
                entry.handle.post(queued.id, queued.payload, self.auth_token);
            }
        }
    }

    /// MaintenanceLoop hook: settles any task past its deadline with `Timeout` and
    /// terminates its carrier worker.
    pub fn enforce_timeouts(&self) {
        let now = self.clock.now();
        let mut settled: Vec<crate::task::ResultSink> = Vec::new();
        let mut to_terminate: Vec<(u64, WorkerHandle)> = Vec::new();

        {
            let mut state = self.state.lock();
            let expired = state.table.expired(now);
            for task_id in expired {
                let assigned_worker = state.table.assigned_worker(task_id);
                if let Some((sink, _meta)) = state.table.remove_with_meta(task_id) {
                    settled.push(sink);
                }
                if let Some(worker_id) = assigned_worker {
                    if let Some(entry) = state.registry.remove(worker_id) {
                        to_terminate.push((worker_id, entry.handle));
                    }
                } else {
                    // Still sitting in the queue, never handed to a worker: drop it
                    // there too, or drain_queue would later dispatch already-abandoned
                    // work whose result has nowhere to land.
                    state.queue.remove(task_id);
                }
            }
        }

        let had_timeouts = !settled.is_empty();
        for sink in settled {
            self.stats.record_failure(Duration::ZERO, now);
            sink.settle(Err(TaskError::Timeout));
        }
        for (worker_id, mut handle) in to_terminate {
            warn!(worker_id, "terminating worker that missed a task deadline");
            handle.terminate();
        }
        if had_timeouts {
            self.drain_queue();
        }
    }

    /// MaintenanceLoop hook: reclaims idle workers past `idle_timeout_ms`, keeping at
    /// least `min_workers` live.
    pub fn reclaim_idle(&self) {
        let now = self.clock.now();
        let mut to_terminate = Vec::new();

        {
            let mut state = self.state.lock();
            let idle_timeout = Duration::from_millis(state.config.idle_timeout_ms);
            let min_workers = state.config.min_workers;
            let cutoff = now.checked_sub(idle_timeout).unwrap_or(now);
            let mut live = state.registry.len() as u32;

            for worker_id in state.registry.idle_older_than(cutoff) {
                if live <= min_workers {
                    break;
                }
                if let Some(entry) = state.registry.remove(worker_id) {
                    to_terminate.push((worker_id, entry.handle));
                    live -= 1;
                }
            }
        }

        for (worker_id, mut handle) in to_terminate {
            debug!(worker_id, "reclaiming idle worker");
            handle.terminate();
        }
    }

    /// MaintenanceLoop hook: recomputes `effective_max` and, in adaptive mode,
    /// attempts one proactive spawn if the backlog warrants it.
    pub fn recompute_adaptive(&self) {
        let mut state = self.state.lock();
        let effective_max = AdaptiveController::effective_max(self.memory_probe.as_ref(), &state.config);
        let blocked = AdaptiveController::memory_blocked(self.memory_probe.as_ref(), &state.config);
        let live_workers = state.registry.len() as u32;
        let queue_len = state.queue.len();

        if AdaptiveController::should_proactively_spawn(&state.config, queue_len, live_workers, effective_max, blocked) {
            self.spawn_worker_locked(&mut state);
        }
        drop(state);
        self.drain_queue();
    }

    /// Applies the once-per-batch idle-timeout heuristic.
    pub fn adjust_idle_timeout_for_batch(&self, batch_size: usize) {
        let mut state = self.state.lock();
        AdaptiveController::adjust_idle_timeout_for_batch(&mut state.config, batch_size);
    }

    /// Replaces the pool configuration, reapplying the workload profile's idle
    /// timeout unless the caller just overrode it explicitly.
    pub fn configure(&self, mut new_config: PoolConfig, idle_timeout_overridden: bool) -> Result<(), String> {
        new_config.validate()?;
        new_config.idle_timeout_overridden = idle_timeout_overridden;
        new_config.apply_workload_profile();
        let mut state = self.state.lock();
        state.config = new_config;
        Ok(())
    }

    /// Snapshot of the current configuration.
    pub fn config_snapshot(&self) -> PoolConfig {
        self.state.lock().config.clone()
    }

    /// A `Stats` snapshot combining live dispatcher state with rolling counters.
    pub fn stats(&self) -> Stats {
        let state = self.state.lock();
        let (idle, busy, terminating) = state.registry.counts();
        let live_workers = (idle + busy + terminating) as u32;
        let queue_length = state.queue.len();
        drop(state);
        self.stats.snapshot(live_workers, busy, queue_length, self.clock.now())
    }

    /// Live worker count, for health reporting.
    pub fn live_workers(&self) -> u32 {
        self.state.lock().registry.len() as u32
    }

    /// Whether the pool is closing or closed.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Begins shutdown: blocks new submissions, waits up to `timeout` for in-flight
    /// tasks to settle naturally, then force-settles any still-pending tasks with
    /// `PoolClosed` and terminates every worker.
    pub fn shutdown(&self, timeout: Duration) {
        self.closing.store(true, Ordering::Release);
        let deadline = self.clock.now() + timeout;

        loop {
            let remaining = {
                let state = self.state.lock();
                state.table.len()
            };
            if remaining == 0 || self.clock.now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let (remaining_sinks, remaining_workers) = {
            let mut state = self.state.lock();
            let sinks = state.table.drain();
            let worker_ids = state.registry.ids();
            let mut handles = Vec::with_capacity(worker_ids.len());
            for worker_id in worker_ids {
                if let Some(entry) = state.registry.remove(worker_id) {
                    handles.push(entry.handle);
                }
            }
            (sinks, handles)
        };

        for sink in remaining_sinks {
            sink.settle(Err(TaskError::PoolClosed));
        }
        for mut handle in remaining_workers {
            handle.terminate();
        }

        info!("pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::executor::test_support::EchoExecutor;
    use crate::memory_probe::FakeMemoryProbe;
    use std::time::Duration as StdDuration;

    fn dispatcher(config: PoolConfig) -> Arc<Dispatcher<EchoExecutor>> {
        Dispatcher::new(
            config,
            Arc::new(EchoExecutor),
            Arc::new(FakeClock::new()),
            Arc::new(FakeMemoryProbe::new(80.0)),
        )
    }

    #[tokio::test]
    async fn fast_path_dispatches_to_idle_worker() {
        let config = PoolConfig {
            min_workers: 1,
            ..PoolConfig::default()
        };
        let d = dispatcher(config);
        let waiter = d.submit(vec![1, 2, 3], TaskOptions::default()).unwrap();
        let outcome = tokio::time::timeout(StdDuration::from_secs(5), waiter.wait())
            .await
            .expect("task did not complete in time");
        assert_eq!(outcome, Ok(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let d = dispatcher(PoolConfig::default());
        d.shutdown(StdDuration::from_millis(50));
        let result = d.submit(vec![1], TaskOptions::default());
        assert_eq!(result.err(), Some(TaskError::PoolClosed));
    }
}
