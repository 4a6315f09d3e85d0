//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    PoolStats, SchedulerError, Spawn, Task, TaskExecutor, TaskId, TaskScheduler, TaskStatus,
    Worker, WorkerStatus,
};
use crate::optimizer::{OptimizerDiagnostics, PerformanceOptimizer};
use crate::util::clock::now_ms;

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission<P> {
    /// Task identifier; generated when absent.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Task type.
    pub task_type: String,
    /// Priority; lower is more urgent.
    pub priority: u32,
    /// Tasks that must complete first.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Opaque payload.
    pub payload: P,
}

impl<P> TaskSubmission<P> {
    /// Convert into a pending task.
    #[must_use]
    pub fn into_task(self) -> Task<P> {
        let task = match self.task_id {
            Some(id) => Task::with_id(id, self.task_type, self.priority, self.payload),
            None => Task::new(self.task_type, self.priority, self.payload),
        };
        task.depends_on(self.dependencies)
    }
}

/// Task status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Failure or cancellation reason, once terminal.
    pub reason: Option<String>,
}

/// Queued task summary, without its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTaskView {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task type.
    pub task_type: String,
    /// Priority.
    pub priority: u32,
    /// Retries performed so far.
    pub retry_count: u32,
    /// Dependencies still referenced.
    pub dependencies: Vec<TaskId>,
}

/// Full diagnostic snapshot for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// Snapshot time, ms since epoch.
    pub generated_at_ms: u64,
    /// Pool statistics.
    pub pool: PoolStats,
    /// Queue contents in dispatch order.
    pub queue: Vec<QueuedTaskView>,
    /// Worker records.
    pub workers: Vec<Worker>,
    /// Cache, quota, dedup, metrics, and load state.
    pub optimizer: OptimizerDiagnostics,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Accepting work with at least one worker out of `error`.
    pub ok: bool,
    /// Shutdown has begun.
    pub shutting_down: bool,
    /// Workers in the pool.
    pub total_workers: usize,
    /// Workers currently in `error`.
    pub error_workers: usize,
}

/// Submit tasks in one all-or-nothing batch and return their ids.
///
/// # Errors
///
/// Propagates the scheduler's validation error for the batch.
pub fn submit_tasks<P, R, E, S>(
    scheduler: &TaskScheduler<P, R, E, S>,
    requests: Vec<TaskSubmission<P>>,
) -> Result<Vec<TaskId>, SchedulerError>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let tasks: Vec<Task<P>> = requests.into_iter().map(TaskSubmission::into_task).collect();
    let ids = tasks.iter().map(|t| t.id.clone()).collect();
    scheduler.add_tasks(tasks)?;
    Ok(ids)
}

/// Look up a task's status and, once terminal, its failure reason.
pub fn task_status<P, R, E, S>(
    scheduler: &TaskScheduler<P, R, E, S>,
    task_id: &str,
) -> Option<TaskStatusResponse>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let status = scheduler.task_status(task_id)?;
    let reason = if status.is_terminal() {
        scheduler.result(task_id).and_then(|r| r.error)
    } else {
        None
    };
    Some(TaskStatusResponse {
        task_id: task_id.to_string(),
        status,
        reason,
    })
}

/// Build a diagnostic snapshot of the scheduler and optimizer.
pub fn diagnostics<P, R, E, S>(
    scheduler: &TaskScheduler<P, R, E, S>,
    optimizer: &PerformanceOptimizer,
) -> DiagnosticsSnapshot
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let queue = scheduler
        .queued()
        .into_iter()
        .map(|t| QueuedTaskView {
            task_id: t.id,
            task_type: t.task_type,
            priority: t.priority,
            retry_count: t.retry_count,
            dependencies: t.dependencies.into_iter().collect(),
        })
        .collect();
    DiagnosticsSnapshot {
        generated_at_ms: now_ms(),
        pool: scheduler.stats(),
        queue,
        workers: scheduler.workers(),
        optimizer: optimizer.diagnostics(),
    }
}

/// Return a health payload.
pub fn health<P, R, E, S>(scheduler: &TaskScheduler<P, R, E, S>) -> Health
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let workers = scheduler.workers();
    let error_workers = workers
        .iter()
        .filter(|w| w.status == WorkerStatus::Error)
        .count();
    let shutting_down = scheduler.is_shutdown();
    Health {
        ok: !shutting_down && workers.len() > error_workers,
        shutting_down,
        total_workers: workers.len(),
        error_workers,
    }
}
