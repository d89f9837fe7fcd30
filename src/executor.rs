//! Task execution trait, the worker's contract with caller-supplied business logic.

use async_trait::async_trait;

use crate::error::TaskError;

/// Abstraction for executing a single task's payload inside a worker thread.
///
/// Implementations are provided by the caller. Each worker holds one `Executor` and
/// calls `execute` once per dispatched task, inside the worker's own single-threaded
/// Tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use workpool::{Executor, TaskError};
///
/// #[derive(Clone)]
/// struct UppercaseExecutor;
///
/// #[async_trait]
/// impl Executor for UppercaseExecutor {
///     async fn execute(&self, payload: Vec<u8>) -> Result<Vec<u8>, TaskError> {
///         let text = String::from_utf8(payload)
///             .map_err(|e| TaskError::InvalidPayload(e.to_string()))?;
///         Ok(text.to_uppercase().into_bytes())
///     }
/// }
/// ```
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Runs the caller's business logic over a task's payload and returns its result
    /// bytes, or a `TaskError` if the payload could not be processed.
    async fn execute(&self, payload: Vec<u8>) -> Result<Vec<u8>, TaskError>;
}
