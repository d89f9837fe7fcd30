//! Error types for the worker pool control plane.

use thiserror::Error;

/// The outcome of a single submitted task, as delivered through its result sink.
///
/// This is the typed failure taxonomy a caller observes when awaiting (or blocking on)
/// the handle returned from [`crate::Pool::submit`]. It is distinct from [`PoolError`],
/// which is returned synchronously from admission calls that never reach a worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The payload failed the codec's pre-submit `encodable` check.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The task's deadline elapsed before a result was produced.
    #[error("task timed out")]
    Timeout,

    /// The worker carrying this task exited (panic, process signal, framing error)
    /// before delivering an outcome.
    #[error("worker crashed before completing the task")]
    WorkerCrashed,

    /// The executor produced a value that could not be encoded on the return path.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// The pool was shut down while this task was queued or in flight.
    #[error("pool is closed")]
    PoolClosed,
}

/// Errors returned synchronously from `Pool` admission and control calls
/// (`submit`, `configure`, `shutdown`) rather than delivered through a sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has entered or completed shutdown; no new work is accepted.
    #[error("pool is closed")]
    PoolClosed,

    /// The payload was rejected by the codec's `encodable` predicate before admission.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result for setup/config paths outside the typed task taxonomy.
pub type AppResult<T> = Result<T, anyhow::Error>;
