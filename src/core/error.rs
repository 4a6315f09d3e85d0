//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// Validation errors are rejected immediately and never retried. Execution
/// failures and timeouts are handled inside the scheduler and surface only as
/// terminal [`ExecutionResult`](crate::core::ExecutionResult)s; the variants
/// exist so they can be logged and reported with a uniform type.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Queue is at its configured capacity.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Distribution or balancing strategy name is not recognized.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    /// Worker still has tasks assigned and cannot be removed.
    #[error("worker {0} is busy")]
    WorkerBusy(String),
    /// Worker id does not exist in the pool.
    #[error("worker not found: {0}")]
    WorkerNotFound(String),
    /// A task with the same id is already queued or running.
    #[error("duplicate task: {0}")]
    DuplicateTask(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Scheduler no longer accepts work.
    #[error("scheduler has been shut down")]
    PoolShutdown,
    /// The execution callback returned an error or panicked.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// A running task exceeded the worker timeout.
    #[error("task {0} timed out")]
    Timeout(String),
    /// Queue and in-flight work did not drain before the deadline.
    #[error("shutdown timed out with {0} tasks outstanding")]
    ShutdownTimeout(usize),
}

impl SchedulerError {
    /// Whether the error enters the retry path.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_) | Self::Timeout(_))
    }
}

/// Application-facing result using anyhow for callbacks and higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
