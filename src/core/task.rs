//! Task and execution-result models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;

/// Task identifier.
pub type TaskId = String;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued or waiting for a retry.
    Pending,
    /// Assigned to a worker and executing.
    Processing,
    /// Finished successfully.
    Completed,
    /// Failed after exhausting retries.
    Failed,
    /// Last attempt exceeded the worker timeout; transient until retried or failed.
    Timeout,
    /// Dropped because a dependency did not complete.
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A unit of work submitted to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize"))]
#[serde(bound(deserialize = "P: serde::de::DeserializeOwned"))]
pub struct Task<P> {
    /// Unique task identifier.
    pub id: TaskId,
    /// Task type, used for skill matching and metric names.
    pub task_type: String,
    /// Priority; lower values are more urgent.
    pub priority: u32,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Ids of tasks that must complete before this one can run.
    pub dependencies: BTreeSet<TaskId>,
    /// Number of retries already performed.
    pub retry_count: u32,
    /// Submission time in milliseconds since epoch.
    pub created_at_ms: u64,
    /// Caller-supplied payload handed to the executor.
    pub payload: P,
}

impl<P> Task<P> {
    /// Create a pending task with a generated id.
    pub fn new(task_type: impl Into<String>, priority: u32, payload: P) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), task_type, priority, payload)
    }

    /// Create a pending task with an explicit id.
    pub fn with_id(
        id: impl Into<TaskId>,
        task_type: impl Into<String>,
        priority: u32,
        payload: P,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            priority,
            status: TaskStatus::Pending,
            dependencies: BTreeSet::new(),
            retry_count: 0,
            created_at_ms: now_ms(),
            payload,
        }
    }

    /// Add dependencies that must complete first.
    #[must_use]
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Outcome recorded for a terminal task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Executor returned `Ok`.
    Success,
    /// Executor kept failing until retries ran out.
    Failed,
    /// Final attempt timed out.
    Timeout,
    /// Never executed because a dependency did not complete.
    Cancelled,
}

/// Terminal execution record for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize"))]
#[serde(bound(deserialize = "R: serde::de::DeserializeOwned"))]
pub struct ExecutionResult<R> {
    /// Task identifier.
    pub task_id: TaskId,
    /// Worker that ran the final attempt; `None` when never dispatched.
    pub worker_id: Option<String>,
    /// Outcome.
    pub status: ExecutionStatus,
    /// Start of the final attempt, ms since epoch.
    pub start_time_ms: u64,
    /// End of the final attempt, ms since epoch.
    pub end_time_ms: u64,
    /// Duration of the final attempt.
    pub duration_ms: u64,
    /// Retries performed before this outcome.
    pub retries: u32,
    /// Executor output on success.
    pub data: Option<R>,
    /// Error description on failure.
    pub error: Option<String>,
}
