//! Tests for builder modules

use std::time::Duration;

use async_trait::async_trait;
use prometheus_task_governor::builders::build_runtime;
use prometheus_task_governor::config::SchedulerConfig;
use prometheus_task_governor::core::{AppResult, SchedulerError, Task, TaskExecutor, Worker};
use prometheus_task_governor::runtime::TokioSpawner;

#[derive(Clone)]
struct LengthExecutor;

#[async_trait]
impl TaskExecutor<String, usize> for LengthExecutor {
    async fn execute(&self, task: Task<String>, _worker: Worker) -> AppResult<usize> {
        Ok(task.payload.len())
    }
}

#[tokio::test]
async fn test_build_runtime_rejects_invalid_config() {
    let mut cfg = SchedulerConfig::default();
    cfg.pool.min_workers = 20;

    let result = build_runtime::<String, usize, _, _>(cfg, LengthExecutor, TokioSpawner::current());
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_runtime_shares_profiler_and_balancer() {
    let rt = build_runtime(
        SchedulerConfig::default(),
        LengthExecutor,
        TokioSpawner::current(),
    )
    .unwrap();
    rt.start();

    rt.scheduler
        .add_task(Task::with_id("len", "feature", 1, "four".to_string()))
        .unwrap();
    rt.scheduler
        .wait_for_completion(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(rt.scheduler.result("len").and_then(|r| r.data), Some(4));

    let diag = rt.optimizer.diagnostics();
    assert_eq!(diag.metrics["task:feature"].count, 1);
    assert!(diag.load.contains_key("codegen"));
    assert_eq!(diag.load.values().map(|l| l.load).sum::<usize>(), 0);

    rt.scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
    rt.optimizer.stop_maintenance();
}

#[test]
fn test_start_outside_runtime_uses_spawner_handle() {
    let tokio_rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let mut cfg = SchedulerConfig::default();
    cfg.optimizer.cache_sweep_interval_ms = 20;
    let rt = build_runtime::<String, usize, _, _>(
        cfg,
        LengthExecutor,
        TokioSpawner::new(tokio_rt.handle().clone()),
    )
    .unwrap();

    rt.optimizer
        .cache()
        .insert("short", serde_json::json!(1), Some(Duration::from_millis(10)));
    rt.start();

    tokio_rt.block_on(async { tokio::time::sleep(Duration::from_millis(200)).await });
    assert!(rt.optimizer.cache().is_empty());
    assert_eq!(rt.optimizer.diagnostics().cache.expirations, 1);

    rt.optimizer.stop_maintenance();
}
