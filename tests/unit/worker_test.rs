//! Tests for the worker pool and its scaling rules

use prometheus_task_governor::config::PoolConfig;
use prometheus_task_governor::core::{
    AgentKind, ScaleDecision, SchedulerError, WorkerPool, WorkerStatus,
};

fn pool_config(min_workers: usize, max_workers: usize) -> PoolConfig {
    PoolConfig {
        min_workers,
        max_workers,
        ..PoolConfig::default()
    }
}

#[test]
fn test_pool_starts_with_min_workers_cycling_kinds() {
    let pool = WorkerPool::from_config(&pool_config(3, 10));
    let ids: Vec<&str> = pool.workers().iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["codegen-001", "review-002", "test-003"]);
    assert!(pool
        .workers()
        .iter()
        .all(|w| w.status == WorkerStatus::Idle && w.current_load == 0));
    assert!(pool.load_ratio().abs() < f64::EPSILON);
}

#[test]
fn test_agent_kind_parse_and_skills() {
    let kind: AgentKind = "review".parse().unwrap();
    assert_eq!(kind, AgentKind::Review);
    assert!(kind.skills().contains(&"code-review"));
    assert!(matches!(
        "janitor".parse::<AgentKind>(),
        Err(SchedulerError::InvalidConfig(_))
    ));
    assert!(AgentKind::Coordinator.priority_weight() > AgentKind::Issue.priority_weight());
}

#[test]
fn test_idle_pool_at_minimum_holds() {
    let config = pool_config(2, 10);
    let mut pool = WorkerPool::from_config(&config);
    assert_eq!(pool.scale_decision(&config), ScaleDecision::Hold);
    assert_eq!(pool.auto_scale(&config), 0);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.count_with(WorkerStatus::Idle), 2);
}

#[test]
fn test_scale_down_keeps_min_workers() {
    let mut pool = WorkerPool::from_config(&pool_config(6, 10));
    let config = pool_config(2, 10);

    assert_eq!(pool.scale_decision(&config), ScaleDecision::Down(3));
    assert_eq!(pool.auto_scale(&config), -3);
    assert_eq!(pool.len(), 3);

    let ids: Vec<&str> = pool.workers().iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["codegen-001", "review-002", "test-003"]);

    assert_eq!(pool.auto_scale(&config), -1);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.scale_decision(&config), ScaleDecision::Hold);
}

#[test]
fn test_remove_worker_errors() {
    let mut pool = WorkerPool::from_config(&pool_config(1, 2));
    assert!(matches!(
        pool.remove_worker("ghost-999"),
        Err(SchedulerError::WorkerNotFound(_))
    ));

    let id = pool.add_worker(AgentKind::Deploy);
    assert_eq!(id, "deploy-002");
    assert!(pool.get(&id).is_some());
    assert!(pool.remove_worker(&id).is_ok());
    assert_eq!(pool.len(), 1);
}
