//! Tests for the in-memory queue and result store

use prometheus_task_governor::core::{ExecutionResult, ExecutionStatus, SchedulerError, Task};
use prometheus_task_governor::infra::{InMemoryQueue, InMemoryResultStore};

fn result(task_id: &str, status: ExecutionStatus) -> ExecutionResult<String> {
    ExecutionResult {
        task_id: task_id.to_string(),
        worker_id: Some("codegen-001".to_string()),
        status,
        start_time_ms: 1_000,
        end_time_ms: 1_250,
        duration_ms: 250,
        retries: 0,
        data: (status == ExecutionStatus::Success).then(|| format!("{task_id} output")),
        error: (status != ExecutionStatus::Success).then(|| "boom".to_string()),
    }
}

#[test]
fn test_queue_orders_by_priority_then_arrival() {
    let mut q = InMemoryQueue::new(10);
    q.enqueue(Task::with_id("low", "feature", 9, ())).unwrap();
    q.enqueue(Task::with_id("high-1", "bug", 1, ())).unwrap();
    q.enqueue(Task::with_id("high-2", "bug", 1, ())).unwrap();

    let order: Vec<String> = q.iter().map(|t| t.id.clone()).collect();
    assert_eq!(order, vec!["high-1", "high-2", "low"]);
    assert_eq!(q.dequeue().map(|t| t.id).as_deref(), Some("high-1"));
    assert_eq!(q.len(), 2);
}

#[test]
fn test_queue_rejects_past_max_depth() {
    let mut q = InMemoryQueue::new(1);
    q.enqueue(Task::with_id("a", "feature", 1, ())).unwrap();
    let err = q.enqueue(Task::with_id("b", "feature", 1, ())).unwrap_err();
    assert!(matches!(err, SchedulerError::QueueFull(_)));
    assert_eq!(q.max_depth(), 1);
}

#[test]
fn test_result_store_keeps_first_terminal_order() {
    let mut store = InMemoryResultStore::new();
    assert!(store.is_empty());

    store.record(result("a", ExecutionStatus::Failed));
    store.record(result("b", ExecutionStatus::Success));
    store.record(result("a", ExecutionStatus::Success));

    let ids: Vec<String> = store.list().into_iter().map(|r| r.task_id).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(store.len(), 2);
    assert_eq!(store.count_with(ExecutionStatus::Success), 2);
    assert_eq!(store.count_with(ExecutionStatus::Failed), 0);
    assert_eq!(
        store.get("a").and_then(|r| r.data.clone()).as_deref(),
        Some("a output")
    );
}
