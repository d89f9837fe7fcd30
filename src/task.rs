//! Task identity, queued-task representation, and the single-shot result sink.

use std::time::Instant;

use tokio::sync::oneshot;

use crate::error::TaskError;

/// Unique, monotonically increasing identifier for a submitted task.
pub type TaskId = u64;

/// The outcome of a task: its result bytes, or a typed failure.
pub type Outcome = Result<Vec<u8>, TaskError>;

/// Per-call submission options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskOptions {
    /// Overrides the pool's configured `task_timeout_ms` for this call only.
    /// `None` means "use the pool default".
    pub timeout_override_ms: Option<u64>,
}

/// A task waiting in the queue: its id, opaque payload, and admission options.
pub struct QueuedTask {
    /// The task's identifier.
    pub id: TaskId,
    /// The opaque payload bytes handed to the executor.
    pub payload: Vec<u8>,
    /// Submission-time options.
    pub options: TaskOptions,
}

/// The writer half of a task's single-shot result channel.
///
/// Held by the `TaskTable` entry until the task settles. Dropping it without calling
/// `settle` (e.g. because the pool itself is dropped) causes the paired `ResultWaiter`
/// to observe a closed channel, which `Pool` surfaces as `TaskError::PoolClosed`.
pub struct ResultSink {
    tx: oneshot::Sender<Outcome>,
}

/// The reader half of a task's single-shot result channel, returned to the caller as
/// the future-like handle from `Pool::submit`.
pub struct ResultWaiter {
    rx: oneshot::Receiver<Outcome>,
}

/// Creates a linked sink/waiter pair for one task.
#[must_use]
pub fn result_channel() -> (ResultSink, ResultWaiter) {
    let (tx, rx) = oneshot::channel();
    (ResultSink { tx }, ResultWaiter { rx })
}

impl ResultSink {
    /// Delivers the final outcome for this task. Consumes the sink, enforcing the
    /// at-most-once-settle invariant at the type level: a caller cannot call `settle`
    /// twice on the same sink.
    pub fn settle(self, outcome: Outcome) {
        // A dropped receiver (caller gave up on the waiter) is not an error here;
        // the result simply has nowhere to go.
        let _ = self.tx.send(outcome);
    }
}

impl ResultWaiter {
    /// Awaits the task's outcome. Resolves to `TaskError::WorkerCrashed` if the sink
    /// was dropped without settling (this should not happen in normal operation; the
    /// pool always settles or the sink is held by a live `TaskTable` entry until
    /// shutdown forces a `PoolClosed` settle).
    pub async fn wait(self) -> Outcome {
        self.rx
            .await
            .unwrap_or(Err(TaskError::WorkerCrashed))
    }

    /// Blocks the current thread until the outcome arrives. For callers outside an
    /// async context.
    pub fn wait_blocking(self) -> Outcome {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(TaskError::WorkerCrashed))
    }
}

/// Metadata tracked per in-flight task, independent of its sink.
pub struct TaskMeta {
    /// When the task was admitted.
    pub submit_time: Instant,
    /// Absolute deadline, if a timeout applies.
    pub deadline: Option<Instant>,
    /// The worker currently executing this task, if assigned.
    pub assigned: Option<u64>,
}
