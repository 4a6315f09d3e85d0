//! Task execution callback trait.

use async_trait::async_trait;

use super::{AppResult, Task, Worker};

/// Abstraction for executing a task on a worker and producing a result.
///
/// This is the only required integration point with the backend. Returning
/// `Err` (or panicking) is treated as an execution failure and enters the
/// retry path; `Ok` finalizes the task as completed.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_governor::core::{AppResult, Task, TaskExecutor, Worker};
///
/// #[derive(Clone)]
/// struct IssueExecutor;
///
/// #[async_trait]
/// impl TaskExecutor<String, String> for IssueExecutor {
///     async fn execute(&self, task: Task<String>, worker: Worker) -> AppResult<String> {
///         Ok(format!("{} handled {}", worker.id, task.payload))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Execute one attempt of `task` on `worker`.
    ///
    /// The task and worker are snapshots taken at dispatch time; mutating them
    /// has no effect on scheduler state.
    async fn execute(&self, task: Task<P>, worker: Worker) -> AppResult<R>;
}
