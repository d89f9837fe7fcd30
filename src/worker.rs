//! A single worker: one OS thread running a single-threaded Tokio runtime, isolated
//! from every other worker and from the caller's thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error};

use crate::executor::Executor;
use crate::task::{Outcome, TaskId};

/// Auth token width in bytes (256 bits), generated once per pool and shared by every
/// worker the pool spawns.
pub type AuthToken = [u8; 32];

/// One task handed to a worker over its inbound channel.
pub struct WorkerMessage {
    /// The task's identifier, echoed back on completion.
    pub task_id: TaskId,
    /// The opaque payload to execute.
    pub payload: Vec<u8>,
    /// Must match the token the worker was started with or the message is refused.
    pub auth_token: AuthToken,
}

/// Events a worker reports back to the dispatcher over its outbound channel.
pub enum WorkerEvent {
    /// The named task finished; the worker is idle again.
    Completed {
        /// Which worker produced this result.
        worker_id: u64,
        /// The task this result belongs to.
        task_id: TaskId,
        /// The task's outcome.
        outcome: Outcome,
    },
    /// The worker's thread is exiting, gracefully or otherwise. The dispatcher decides
    /// whether this was expected (explicit terminate already recorded) or a crash
    /// (worker still held live in the registry, possibly mid-task).
    Exited {
        /// The worker that exited.
        worker_id: u64,
    },
}

/// An owned handle to a spawned worker thread and its inbound channel.
///
/// Dropping (or calling `terminate` on) the handle closes the inbound sender, which
/// unblocks the worker's `recv` loop so the thread can exit on its own.
pub struct WorkerHandle {
    /// The worker's identifier, stable for its lifetime.
    pub worker_id: u64,
    inbound: Option<Sender<WorkerMessage>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Starts a worker thread running `executor`, authenticated with `auth_token`.
    /// Events are sent to `events`, shared by every worker in the pool so the
    /// dispatcher's router thread can read from a single channel.
    pub fn start<E>(
        worker_id: u64,
        executor: Arc<E>,
        auth_token: AuthToken,
        events: Sender<WorkerEvent>,
        stack_size: usize,
    ) -> Self
    where
        E: Executor,
    {
        let (inbound_tx, inbound_rx) = bounded::<WorkerMessage>(1);

        let join = thread::Builder::new()
            .name(format!("workpool-worker-{worker_id}"))
            .stack_size(stack_size)
            .spawn(move || worker_main(worker_id, inbound_rx, executor, auth_token, events))
            .expect("failed to spawn worker thread");

        Self {
            worker_id,
            inbound: Some(inbound_tx),
            join: Some(join),
        }
    }

    /// Delivers one task to this worker. The caller is responsible for only posting
    /// to an idle worker; the channel is bounded to 1 to make a second concurrent post
    /// a programming error that blocks rather than silently queuing behind the worker.
    pub fn post(&self, task_id: TaskId, payload: Vec<u8>, auth_token: AuthToken) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(WorkerMessage {
                task_id,
                payload,
                auth_token,
            });
        }
    }

    /// Asynchronously terminates the worker by dropping its inbound sender, which
    /// unblocks the worker's `recv` and lets it exit. Safe to call in any state; the
    /// thread is not joined here so a stuck worker can never hang a terminate call.
    pub fn terminate(&mut self) {
        self.inbound.take();
    }

    /// Blocks until the worker thread has exited, waiting at most `timeout`.
    pub fn join_timeout(mut self, timeout: std::time::Duration) {
        self.terminate();
        let Some(join) = self.join.take() else {
            return;
        };
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let waiter = thread::spawn(move || {
            let result = join.join();
            let _ = done_tx.send(result.is_ok());
        });
        match done_rx.recv_timeout(timeout) {
            Ok(true) => debug!(worker_id = self.worker_id, "worker joined cleanly"),
            Ok(false) => error!(worker_id = self.worker_id, "worker thread panicked"),
            Err(_) => {
                debug!(worker_id = self.worker_id, "worker did not exit within timeout, detaching");
            }
        }
        let _ = waiter.join();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Drop the inbound sender to unblock the worker's recv loop. We never join
        // here so a pool teardown can never hang on a stuck worker thread; explicit
        // `join_timeout` is required for a bounded wait.
        self.inbound.take();
    }
}

fn worker_main<E>(
    worker_id: u64,
    inbound: Receiver<WorkerMessage>,
    executor: Arc<E>,
    auth_token: AuthToken,
    events: Sender<WorkerEvent>,
) where
    E: Executor,
{
    debug!(worker_id, "worker thread started");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker_id, error = %e, "failed to build worker runtime");
            let _ = events.send(WorkerEvent::Exited { worker_id });
            return;
        }
    };

    loop {
        let message = match inbound.recv() {
            Ok(message) => message,
            Err(_) => {
                debug!(worker_id, "inbound channel closed, worker exiting");
                break;
            }
        };

        if message.auth_token != auth_token {
            error!(worker_id, task_id = message.task_id, "rejected message with invalid auth token");
            continue;
        }

        let task_id = message.task_id;
        debug!(worker_id, task_id, "worker executing task");

        let executed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.block_on(executor.execute(message.payload))
        }));

        let outcome = match executed {
            Ok(outcome) => outcome,
            Err(_) => {
                // The executor panicked; the worker is no longer trustworthy. Exit
                // without reporting a completion for this task so the dispatcher's
                // crash sweep settles it (and any other task it might somehow still
                // hold) with `WorkerCrashed`, rather than racing a synthetic outcome
                // against that sweep.
                error!(worker_id, task_id, "executor panicked, worker exiting");
                break;
            }
        };

        debug!(worker_id, task_id, "worker completed task");

        if events
            .send(WorkerEvent::Completed {
                worker_id,
                task_id,
                outcome,
            })
            .is_err()
        {
            debug!(worker_id, "event channel closed, worker exiting");
            break;
        }
    }

    let _ = events.send(WorkerEvent::Exited { worker_id });
    debug!(worker_id, "worker thread exiting");
}
