//! Snapshot statistics and health reporting for `Pool::stats`/`Pool::health`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A point-in-time snapshot of pool activity.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Currently live workers (idle + busy + terminating).
    pub live_workers: u32,
    /// Workers currently executing a task.
    pub busy_workers: u32,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Total tasks completed successfully over the pool's lifetime.
    pub completed_tasks: u64,
    /// Total tasks that failed (any `TaskError` variant) over the pool's lifetime.
    pub failed_tasks: u64,
    /// Tasks completed in the last 1 second (rolling window).
    pub throughput_per_sec: u64,
    /// Mean duration of the last 100 completed tasks.
    pub avg_task_duration: Duration,
}

/// Pool health, derived from `MemoryProbe` pressure relative to the safety floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Memory pressure is within normal bounds.
    Healthy,
    /// Free memory has crossed below the safety floor; worker growth is constrained.
    Pressured,
}

/// Health snapshot returned from `Pool::health`.
#[derive(Debug, Clone)]
pub struct Health {
    /// Overall health status.
    pub status: HealthStatus,
    /// Currently live workers.
    pub live_workers: u32,
    /// Percentage of system memory currently in use.
    pub memory_usage_percent: f64,
}

const DURATION_WINDOW: usize = 100;

/// Lock-free counters plus a small windowed-history buffer for throughput and mean
/// task duration, sampled into a `Stats` snapshot on demand.
#[derive(Default)]
pub struct StatsCounters {
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    /// Completion instants within the last second, for rolling throughput.
    recent_completions: Mutex<VecDeque<Instant>>,
    /// Durations of the last `DURATION_WINDOW` completed tasks.
    recent_durations: Mutex<VecDeque<Duration>>,
}

impl StatsCounters {
    /// Creates a fresh, zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful completion with its end-to-end duration.
    pub fn record_success(&self, duration: Duration, now: Instant) {
        self.completed_tasks.fetch_add(1, Ordering::Relaxed);
        self.record_window(duration, now);
    }

    /// Records a failed completion (any `TaskError` variant) with its duration.
    pub fn record_failure(&self, duration: Duration, now: Instant) {
        self.failed_tasks.fetch_add(1, Ordering::Relaxed);
        self.record_window(duration, now);
    }

    fn record_window(&self, duration: Duration, now: Instant) {
        let mut completions = self.recent_completions.lock();
        completions.push_back(now);
        while completions
            .front()
            .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(1))
        {
            completions.pop_front();
        }
        drop(completions);

        let mut durations = self.recent_durations.lock();
        durations.push_back(duration);
        while durations.len() > DURATION_WINDOW {
            durations.pop_front();
        }
    }

    /// Produces a `Stats` snapshot, filling in the worker/queue fields the dispatcher
    /// tracks separately.
    #[must_use]
    pub fn snapshot(&self, live_workers: u32, busy_workers: u32, queue_length: usize, now: Instant) -> Stats {
        let completions = self.recent_completions.lock();
        let throughput_per_sec = completions
            .iter()
            .filter(|t| now.duration_since(**t) <= Duration::from_secs(1))
            .count() as u64;
        drop(completions);

        let durations = self.recent_durations.lock();
        let avg_task_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = durations.iter().sum();
            total / durations.len() as u32
        };
        drop(durations);

        Stats {
            live_workers,
            busy_workers,
            queue_length,
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            throughput_per_sec,
            avg_task_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_completed_and_failed_counts() {
        let counters = StatsCounters::new();
        let now = Instant::now();
        counters.record_success(Duration::from_millis(10), now);
        counters.record_failure(Duration::from_millis(20), now);
        let stats = counters.snapshot(2, 1, 0, now);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.throughput_per_sec, 2);
    }

    #[test]
    fn duration_window_caps_at_100() {
        let counters = StatsCounters::new();
        let now = Instant::now();
        for _ in 0..150 {
            counters.record_success(Duration::from_millis(5), now);
        }
        let durations = counters.recent_durations.lock();
        assert_eq!(durations.len(), DURATION_WINDOW);
    }

    #[test]
    fn throughput_excludes_old_completions() {
        let counters = StatsCounters::new();
        let t0 = Instant::now();
        counters.record_success(Duration::from_millis(1), t0);
        let later = t0 + Duration::from_secs(2);
        let stats = counters.snapshot(1, 0, 0, later);
        assert_eq!(stats.throughput_per_sec, 0);
    }
}
