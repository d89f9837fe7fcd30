//! # workpool
//!
//! A cooperative worker-pool runtime for offloading CPU- and I/O-bound tasks from a
//! host thread to a managed pool of isolated OS-thread workers.
//!
//! A caller submits an opaque byte payload through [`Pool::submit`] and gets back a
//! [`TaskHandle`] that resolves to the task's result or a typed [`TaskError`]. The pool
//! owns worker lifecycle, admission, dispatch, per-task timeout enforcement,
//! worker-crash recovery, and adaptive capacity control.
//!
//! ## What this crate does not do
//!
//! The payload encoder/decoder and the business logic that actually runs inside a
//! worker are external collaborators, expressed as the [`PayloadCodec`] and
//! [`Executor`] traits. This crate treats payloads as opaque bytes; it never inspects
//! them beyond the codec's `encodable` predicate.
//!
//! ## Example
//!
//! ```rust,no_run
//! use workpool::{Pool, Executor, TaskError, TaskOptions};
//! use async_trait::async_trait;
//!
//! #[derive(Clone)]
//! struct UppercaseExecutor;
//!
//! #[async_trait]
//! impl Executor for UppercaseExecutor {
//!     async fn execute(&self, payload: Vec<u8>) -> Result<Vec<u8>, TaskError> {
//!         let text = String::from_utf8(payload).map_err(|e| TaskError::InvalidPayload(e.to_string()))?;
//!         Ok(text.to_uppercase().into_bytes())
//!     }
//! }
//!
//! # async fn run() {
//! let pool = Pool::builder().max_workers(4).min_workers(1).build(UppercaseExecutor);
//! let handle = pool.submit(b"hello".to_vec(), TaskOptions::default()).unwrap();
//! let outcome = handle.wait().await;
//! assert_eq!(outcome, Ok(b"HELLO".to_vec()));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

/// Adaptive capacity control: effective-max computation and batch heuristics.
pub mod adaptive;
/// Fluent pool construction.
pub mod builders;
/// Monotonic time abstraction, abstracted for tests.
pub mod clock;
/// Payload encoding contract consumed from an external collaborator.
pub mod codec;
/// Pool configuration surface.
pub mod config;
/// Dispatcher: the control plane pairing workers with tasks.
pub mod dispatcher;
/// Typed error taxonomy.
pub mod error;
/// The execution contract a worker runs.
pub mod executor;
/// Periodic maintenance: reclamation, timeout enforcement, adaptive recomputation.
pub mod maintenance;
/// System memory pressure sampling.
pub mod memory_probe;
/// The pool façade.
pub mod pool;
/// Live worker set and dispatch state.
pub mod registry;
/// Snapshot statistics and health reporting.
pub mod stats;
/// Task identity, queueing, and single-shot result sinks.
pub mod task;
/// Pending-submission FIFO.
pub mod task_queue;
/// In-flight task bookkeeping.
pub mod task_table;
/// Structured logging setup.
pub mod telemetry;
/// OS-thread worker wrapper.
pub mod worker;

pub use builders::PoolBuilder;
pub use clock::{Clock, FakeClock, SystemClock};
pub use codec::{PassthroughCodec, PayloadCodec};
pub use config::{LogLevel, MaxWorkers, PoolConfig, WorkloadProfile};
pub use error::{PoolError, TaskError};
pub use executor::Executor;
pub use memory_probe::{FakeMemoryProbe, MemoryProbe, SysinfoMemoryProbe};
pub use pool::{Pool, TaskHandle};
pub use stats::{Health, HealthStatus, Stats};
pub use task::{Outcome, TaskId, TaskOptions};
