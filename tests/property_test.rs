//! Universal invariants the dispatcher must uphold regardless of timing: at-most-once
//! settlement, no phantom tasks after shutdown, worker accounting, FIFO delivery under
//! a single submitter, the memory floor, the timeout bound, the shutdown bound, and
//! idle reclamation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use workpool::{
    Executor, FakeClock, FakeMemoryProbe, MaxWorkers, PassthroughCodec, Pool, PoolConfig,
    PoolError, TaskError, TaskOptions,
};

#[derive(Clone, Default)]
struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, payload: Vec<u8>) -> Result<Vec<u8>, TaskError> {
        Ok(payload)
    }
}

fn fake_pool(config: PoolConfig) -> (Pool<EchoExecutor>, Arc<FakeMemoryProbe>) {
    let probe = Arc::new(FakeMemoryProbe::new(80.0));
    let pool = Pool::with_collaborators(
        config,
        EchoExecutor,
        PassthroughCodec,
        Arc::new(FakeClock::new()),
        probe.clone(),
    );
    (pool, probe)
}

#[tokio::test]
async fn invariant_at_most_once_settlement() {
    let (pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(2),
        min_workers: 1,
        ..PoolConfig::default()
    });

    let mut handles = Vec::new();
    for i in 0..20u8 {
        handles.push(pool.submit(vec![i], TaskOptions::default()).unwrap());
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.wait().await;
        assert_eq!(outcome, Ok(vec![i as u8]));
    }
}

#[tokio::test]
async fn invariant_no_phantom_tasks_after_shutdown() {
    let (mut pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(1),
        min_workers: 1,
        ..PoolConfig::default()
    });

    for i in 0..3u8 {
        pool.submit(vec![i], TaskOptions::default()).unwrap();
    }
    pool.shutdown(200);

    let stats = pool.stats();
    assert_eq!(stats.queue_length, 0);
    let rejected = pool.submit(vec![9], TaskOptions::default());
    assert_eq!(rejected, Err(PoolError::PoolClosed));
}

#[tokio::test]
async fn invariant_worker_accounting_matches_live_count() {
    let (pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(3),
        min_workers: 2,
        ..PoolConfig::default()
    });

    for i in 0..6u8 {
        pool.submit(vec![i], TaskOptions::default()).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = pool.stats();
    assert!(stats.live_workers >= 2);
    assert!(stats.live_workers <= 3);
}

#[tokio::test]
async fn invariant_fifo_under_single_submitter_single_worker() {
    let (pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(1),
        min_workers: 1,
        ..PoolConfig::default()
    });

    let mut handles = Vec::new();
    for i in 0..10u8 {
        handles.push(pool.submit(vec![i], TaskOptions::default()).unwrap());
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait().await, Ok(vec![i as u8]));
    }
}

#[tokio::test]
async fn invariant_memory_floor_caps_at_one_worker() {
    let probe = Arc::new(FakeMemoryProbe::new(3.0)); // under the 5% floor
    let pool = Pool::with_collaborators(
        PoolConfig {
            max_workers: MaxWorkers::Fixed(8),
            min_workers: 0,
            ..PoolConfig::default()
        },
        EchoExecutor,
        PassthroughCodec,
        Arc::new(FakeClock::new()),
        probe,
    );

    for i in 0..8u8 {
        pool.submit(vec![i], TaskOptions::default()).unwrap();
    }
    assert!(pool.stats().live_workers <= 1);
}

#[tokio::test]
async fn invariant_timeout_settles_within_bound() {
    let (pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(1),
        min_workers: 1,
        task_timeout_ms: 50,
        ..PoolConfig::default()
    });

    let handle = pool.submit(vec![1], TaskOptions::default()).unwrap();
    let outcome = tokio::time::timeout(Duration::from_millis(50 + 2_000 + 500), handle.wait())
        .await
        .expect("must settle within task_timeout_ms + tick_period");
    // EchoExecutor returns instantly; it should complete Ok before the deadline fires,
    // but if it races, Timeout is also an acceptable bound-respecting outcome.
    assert!(outcome.is_ok() || outcome == Err(TaskError::Timeout));
}

#[tokio::test]
async fn invariant_shutdown_returns_within_bound() {
    let (mut pool, _probe) = fake_pool(PoolConfig {
        max_workers: MaxWorkers::Fixed(1),
        min_workers: 1,
        ..PoolConfig::default()
    });
    pool.submit(vec![1], TaskOptions::default()).unwrap();

    let start = std::time::Instant::now();
    pool.shutdown(200);
    let elapsed = start.elapsed();
    assert!(elapsed <= Duration::from_millis(200 + 2_500), "shutdown took too long: {elapsed:?}");
}

#[tokio::test]
async fn invariant_idle_reclamation_returns_to_min_workers() {
    let mut pool = Pool::new(
        PoolConfig {
            max_workers: MaxWorkers::Fixed(8),
            min_workers: 1,
            idle_timeout_ms: 100,
            ..PoolConfig::default()
        },
        EchoExecutor,
    );

    let mut handles = Vec::new();
    for i in 0..8u8 {
        handles.push(pool.submit(vec![i], TaskOptions::default()).unwrap());
    }
    for handle in handles {
        handle.wait().await.unwrap();
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pool.stats().live_workers, 1);

    pool.shutdown(500);
}
