//! Map from in-flight task id to its result sink and scheduling metadata.

use std::collections::HashMap;
use std::time::Instant;

use crate::task::{ResultSink, TaskId, TaskMeta};

struct TableEntry {
    sink: ResultSink,
    meta: TaskMeta,
}

/// Tracks every task between admission and settlement.
///
/// A task id appears here from the moment `Pool::submit` records it until its sink is
/// settled and the entry removed; this is disjoint from membership in the `TaskQueue`
/// (an entry here may or may not also be queued, depending on `assigned`).
#[derive(Default)]
pub struct TaskTable {
    entries: HashMap<TaskId, TableEntry>,
}

impl TaskTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a newly admitted task, not yet assigned to a worker.
    pub fn insert(&mut self, id: TaskId, sink: ResultSink, submit_time: Instant, deadline: Option<Instant>) {
        self.entries.insert(
            id,
            TableEntry {
                sink,
                meta: TaskMeta {
                    submit_time,
                    deadline,
                    assigned: None,
                },
            },
        );
    }

    /// Records which worker a task was dispatched to.
    pub fn assign(&mut self, id: TaskId, worker_id: u64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.meta.assigned = Some(worker_id);
        }
    }

    /// Removes and returns a task's sink, consuming the entry.
    #[must_use]
    pub fn remove(&mut self, id: TaskId) -> Option<ResultSink> {
        self.entries.remove(&id).map(|e| e.sink)
    }

    /// Removes and returns both a task's sink and its metadata, for callers that need
    /// `submit_time` to compute a completion duration before the entry is gone.
    #[must_use]
    pub fn remove_with_meta(&mut self, id: TaskId) -> Option<(ResultSink, TaskMeta)> {
        self.entries.remove(&id).map(|e| (e.sink, e.meta))
    }

    /// Returns every task id currently assigned to `worker_id`, for crash sweeps.
    #[must_use]
    pub fn assigned_to(&self, worker_id: u64) -> Vec<TaskId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.meta.assigned == Some(worker_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns every task id whose deadline has elapsed as of `now`.
    #[must_use]
    pub fn expired(&self, now: Instant) -> Vec<TaskId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.meta.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Which worker (if any) a task is assigned to.
    #[must_use]
    pub fn assigned_worker(&self, id: TaskId) -> Option<u64> {
        self.entries.get(&id).and_then(|e| e.meta.assigned)
    }

    /// Number of tasks currently tracked (queued or assigned, not yet settled).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tasks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains every entry, returning its sink, for pool shutdown.
    pub fn drain(&mut self) -> Vec<ResultSink> {
        self.entries.drain().map(|(_, e)| e.sink).collect()
    }
}
