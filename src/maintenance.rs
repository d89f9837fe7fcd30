//! A dedicated background thread driving idle reclamation, timeout enforcement, and
//! adaptive recomputation on a fixed period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::executor::Executor;

/// Default tick period, per the configuration surface's documented default.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(2_000);

/// Owns the maintenance thread for one pool. Dropping or calling `stop` signals the
/// thread to exit after its current tick.
pub struct MaintenanceLoop {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceLoop {
    /// Spawns the maintenance thread, ticking every `period`.
    pub fn spawn<E: Executor>(dispatcher: Arc<Dispatcher<E>>, period: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop_flag = Arc::clone(&stop_flag);

        let handle = std::thread::Builder::new()
            .name("workpool-maintenance".into())
            .spawn(move || {
                while !thread_stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(period);
                    if thread_stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    debug!("maintenance tick");
                    dispatcher.enforce_timeouts();
                    dispatcher.reclaim_idle();
                    dispatcher.recompute_adaptive();
                }
                debug!("maintenance loop exiting");
            })
            .expect("failed to spawn maintenance thread");

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Signals the thread to stop after its current sleep and waits for it to exit.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MaintenanceLoop {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        // Don't join in Drop: the thread may be mid-sleep for up to one tick period,
        // and a dropped Pool should never block the caller's thread waiting for it.
    }
}
