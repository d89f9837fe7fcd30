//! The set of live workers and their dispatch state.

use std::time::Instant;

use crate::task::TaskId;
use crate::worker::WorkerHandle;

/// A live worker's dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Ready to receive a task.
    Idle,
    /// Executing the named task.
    Busy(TaskId),
    /// Being torn down; no longer eligible for dispatch.
    Terminating,
}

/// A registered worker: its thread handle plus bookkeeping the dispatcher needs.
pub struct WorkerEntry {
    /// The owned worker thread handle.
    pub handle: WorkerHandle,
    /// Current dispatch state.
    pub state: WorkerState,
    /// Instant this worker last became idle; used for idle-timeout reclamation.
    pub last_used: Instant,
}

/// The set of workers the dispatcher knows about, in insertion order.
///
/// Idle-worker selection is LIFO over the idle subset (most-recently-busy worker
/// first), so reclamation naturally targets the oldest, coldest workers.
#[derive(Default)]
pub struct WorkerRegistry {
    entries: Vec<(u64, WorkerEntry)>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers a newly spawned worker, idle from the moment it's added.
    pub fn insert(&mut self, worker_id: u64, handle: WorkerHandle, now: Instant) {
        self.entries.push((
            worker_id,
            WorkerEntry {
                handle,
                state: WorkerState::Idle,
                last_used: now,
            },
        ));
    }

    /// Returns the worker id of the most-recently-idled idle worker, if any exists.
    ///
    /// Scanning from the back of insertion order approximates LIFO over the idle set:
    /// workers transition back to idle by in-place state mutation (no reordering), so a
    /// worker that idled more recently tends to sit later among equally-aged peers; we
    /// additionally sort by `last_used` to make the tie-break exact.
    #[must_use]
    pub fn pick_idle(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == WorkerState::Idle)
            .max_by_key(|(_, e)| e.last_used)
            .map(|(id, _)| *id)
    }

    /// Looks up a worker entry by id.
    #[must_use]
    pub fn get(&self, worker_id: u64) -> Option<&WorkerEntry> {
        self.entries.iter().find(|(id, _)| *id == worker_id).map(|(_, e)| e)
    }

    /// Looks up a worker entry by id, mutably.
    pub fn get_mut(&mut self, worker_id: u64) -> Option<&mut WorkerEntry> {
        self.entries.iter_mut().find(|(id, _)| *id == worker_id).map(|(_, e)| e)
    }

    /// Marks a worker busy with the given task.
    pub fn mark_busy(&mut self, worker_id: u64, task_id: TaskId) {
        if let Some(entry) = self.get_mut(worker_id) {
            entry.state = WorkerState::Busy(task_id);
        }
    }

    /// Marks a worker idle, recording the instant it became so.
    pub fn mark_idle(&mut self, worker_id: u64, now: Instant) {
        if let Some(entry) = self.get_mut(worker_id) {
            entry.state = WorkerState::Idle;
            entry.last_used = now;
        }
    }

    /// Marks a worker terminating, excluding it from further dispatch.
    pub fn mark_terminating(&mut self, worker_id: u64) {
        if let Some(entry) = self.get_mut(worker_id) {
            entry.state = WorkerState::Terminating;
        }
    }

    /// Removes a worker entirely, returning its entry for final teardown.
    pub fn remove(&mut self, worker_id: u64) -> Option<WorkerEntry> {
        let index = self.entries.iter().position(|(id, _)| *id == worker_id)?;
        Some(self.entries.remove(index).1)
    }

    /// Total live worker count (idle + busy + terminating).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of workers in each state.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut idle = 0;
        let mut busy = 0;
        let mut terminating = 0;
        for (_, e) in &self.entries {
            match e.state {
                WorkerState::Idle => idle += 1,
                WorkerState::Busy(_) => busy += 1,
                WorkerState::Terminating => terminating += 1,
            }
        }
        (idle, busy, terminating)
    }

    /// Idle workers whose `last_used` is older than `cutoff`, oldest first, capped so
    /// the caller never reclaims below `min_workers` it still wants to keep.
    #[must_use]
    pub fn idle_older_than(&self, cutoff: Instant) -> Vec<u64> {
        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == WorkerState::Idle && e.last_used < cutoff)
            .map(|(id, e)| (*id, e.last_used))
            .collect();
        candidates.sort_by_key(|(_, last_used)| *last_used);
        candidates.into_iter().map(|(id, _)| id).collect()
    }

    /// All worker ids currently registered, for TaskTable crash-sweep lookups.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::EchoExecutor;
    use crossbeam_channel::unbounded;
    use std::sync::Arc;

    fn fake_worker(id: u64) -> WorkerHandle {
        let (tx, _rx) = unbounded();
        WorkerHandle::start(id, Arc::new(EchoExecutor), [0u8; 32], tx, 64 * 1024)
    }

    #[test]
    fn lifo_picks_most_recently_idled() {
        let mut registry = WorkerRegistry::new();
        let t0 = Instant::now();
        registry.insert(1, fake_worker(1), t0);
        registry.insert(2, fake_worker(2), t0 + std::time::Duration::from_millis(10));
        assert_eq!(registry.pick_idle(), Some(2));
    }

    #[test]
    fn busy_worker_not_picked() {
        let mut registry = WorkerRegistry::new();
        let t0 = Instant::now();
        registry.insert(1, fake_worker(1), t0);
        registry.mark_busy(1, 7);
        assert_eq!(registry.pick_idle(), None);
    }

    #[test]
    fn counts_reflect_state() {
        let mut registry = WorkerRegistry::new();
        let t0 = Instant::now();
        registry.insert(1, fake_worker(1), t0);
        registry.insert(2, fake_worker(2), t0);
        registry.mark_busy(1, 1);
        assert_eq!(registry.counts(), (1, 1, 0));
    }
}
