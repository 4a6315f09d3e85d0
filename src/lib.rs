//! # Prometheus Task Governor
//!
//! A concurrent task-scheduling and resource-governance core for automated
//! agent workloads running against rate-limited backends.
//!
//! Tasks are queued by priority, distributed to a pool of typed workers by a
//! pluggable strategy, retried with exponential backoff, and abandoned when a
//! health tick finds them past the worker timeout. The pool grows and shrinks
//! with its busy ratio.
//!
//! Work done inside tasks can go through the [`optimizer`]: a TTL cache, a
//! cooperative rate limiter, a request deduplicator, a bounded concurrency
//! runner, a batch processor, a metrics profiler, and a load balancer.
//!
//! ## Scheduling
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use prometheus_task_governor::builders::build_runtime;
//! use prometheus_task_governor::config::SchedulerConfig;
//! use prometheus_task_governor::core::{AppResult, Task, TaskExecutor, Worker};
//! use prometheus_task_governor::runtime::TokioSpawner;
//! use std::time::Duration;
//!
//! #[derive(Clone)]
//! struct IssueExecutor;
//!
//! #[async_trait]
//! impl TaskExecutor<String, String> for IssueExecutor {
//!     async fn execute(&self, task: Task<String>, worker: Worker) -> AppResult<String> {
//!         Ok(format!("{} handled {}", worker.id, task.payload))
//!     }
//! }
//!
//! let runtime = build_runtime(SchedulerConfig::default(), IssueExecutor, TokioSpawner::current())?;
//! runtime.start();
//! runtime.scheduler.add_task(Task::new("bug", 1, "issue #42".to_string()))?;
//! runtime.scheduler.shutdown(Duration::from_secs(30)).await?;
//! ```
//!
//! ## Optimizer
//!
//! ```rust,ignore
//! let issues: Vec<Issue> = runtime
//!     .optimizer
//!     .with_cache("issues:open", None, || async { client.open_issues().await })
//!     .await?;
//! ```
//!
//! For complete scenarios, see `tests/scheduler_test.rs` and `tests/optimizer_test.rs`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Configuration models for the scheduler, pool, and optimizer.
pub mod config;
/// Core scheduling abstractions: tasks, workers, distribution, retries, and the scheduler.
pub mod core;
/// Infrastructure adapters for queues and result storage.
pub mod infra;
/// Cache, rate limiter, deduplicator, concurrency runner, profiler, and load balancer.
pub mod optimizer;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
