//! Tests for the tokio spawner and the API surface

use std::time::Duration;

use async_trait::async_trait;
use prometheus_task_governor::config::SchedulerConfig;
use prometheus_task_governor::core::{
    AppResult, SchedulerError, Spawn, Task, TaskExecutor, TaskScheduler, TaskStatus, Worker,
};
use prometheus_task_governor::optimizer::PerformanceOptimizer;
use prometheus_task_governor::runtime::{
    diagnostics, health, submit_tasks, task_status, TaskSubmission, TokioSpawner,
};

#[derive(Clone)]
struct EchoExecutor;

#[async_trait]
impl TaskExecutor<String, String> for EchoExecutor {
    async fn execute(&self, task: Task<String>, worker: Worker) -> AppResult<String> {
        if task.payload == "fail" {
            anyhow::bail!("refused by {}", worker.id);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(task.payload.to_uppercase())
    }
}

fn scheduler() -> TaskScheduler<String, String, EchoExecutor, TokioSpawner> {
    let mut config = SchedulerConfig::default();
    config.pool.auto_scale = false;
    config.retry.max_retries = 0;
    TaskScheduler::new(config, EchoExecutor, TokioSpawner::current()).unwrap()
}

fn submission(id: Option<&str>, payload: &str) -> TaskSubmission<String> {
    TaskSubmission {
        task_id: id.map(str::to_string),
        task_type: "feature".to_string(),
        priority: 3,
        dependencies: Vec::new(),
        payload: payload.to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_submission_deserializes_with_defaults() {
    let json = r#"{ "task_type": "bug", "priority": 1, "payload": "fix login" }"#;
    let submission: TaskSubmission<String> = serde_json::from_str(json).unwrap();
    assert!(submission.task_id.is_none());
    assert!(submission.dependencies.is_empty());

    let task = submission.into_task();
    assert_eq!(task.task_type, "bug");
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(!task.id.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_and_query_status() {
    let s = scheduler();
    let ids = submit_tasks(
        &s,
        vec![submission(Some("ok"), "hello"), submission(None, "fail")],
    )
    .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "ok");

    s.wait_for_completion(Duration::from_secs(5)).await.unwrap();

    let ok = task_status(&s, "ok").unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);
    assert!(ok.reason.is_none());

    let failed = task_status(&s, &ids[1]).unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.reason.unwrap().contains("refused by"));

    assert!(task_status(&s, "missing").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_and_diagnostics() {
    let s = scheduler();
    let optimizer = PerformanceOptimizer::new(s.config().optimizer.clone());

    let status = health(&s);
    assert!(status.ok);
    assert_eq!(status.total_workers, 2);
    assert_eq!(status.error_workers, 0);

    s.add_task(Task::with_id("d1", "feature", 1, "x".to_string()))
        .unwrap();
    s.wait_for_completion(Duration::from_secs(5)).await.unwrap();

    let snapshot = diagnostics(&s, &optimizer);
    assert_eq!(snapshot.pool.completed_tasks, 1);
    assert!(snapshot.queue.is_empty());
    assert_eq!(snapshot.workers.len(), 2);
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["optimizer"]["cache"]["hits"].is_u64());

    s.shutdown(Duration::from_secs(1)).await.unwrap();
    let status = health(&s);
    assert!(!status.ok);
    assert!(status.shutting_down);
    assert!(matches!(
        submit_tasks(&s, vec![submission(None, "late")]),
        Err(SchedulerError::PoolShutdown)
    ));
}
