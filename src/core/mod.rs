//! Core scheduling abstractions: tasks, workers, distribution, retries, and the scheduler.

pub mod distributor;
pub mod error;
pub mod executor;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

pub use distributor::{DistributionStrategy, TaskDistributor};
pub use error::{AppResult, SchedulerError};
pub use executor::TaskExecutor;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{HealthReport, Spawn, TaskScheduler};
pub(crate) use stats::PoolCounters;
pub use stats::PoolStats;
pub use task::{ExecutionResult, ExecutionStatus, Task, TaskId, TaskStatus};
pub use worker::{AgentKind, ScaleDecision, Worker, WorkerId, WorkerPool, WorkerStatus};
