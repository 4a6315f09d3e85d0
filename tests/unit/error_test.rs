//! Tests for error types

use prometheus_task_governor::core::SchedulerError;
use prometheus_task_governor::optimizer::OptimizerError;

#[test]
fn test_error_display() {
    let err = SchedulerError::QueueFull("max queue depth 10 reached".into());
    assert_eq!(err.to_string(), "queue full: max queue depth 10 reached");

    let err = SchedulerError::UnknownStrategy("fastest".into());
    assert_eq!(err.to_string(), "unknown strategy: fastest");

    let err = SchedulerError::ShutdownTimeout(3);
    assert_eq!(err.to_string(), "shutdown timed out with 3 tasks outstanding");
}

#[test]
fn test_only_execution_errors_are_retryable() {
    assert!(SchedulerError::ExecutionFailed("boom".into()).is_retryable());
    assert!(SchedulerError::Timeout("t1".into()).is_retryable());
    assert!(!SchedulerError::QueueFull(String::new()).is_retryable());
    assert!(!SchedulerError::DuplicateTask("t1".into()).is_retryable());
    assert!(!SchedulerError::PoolShutdown.is_retryable());
    assert!(!SchedulerError::InvalidConfig("bad".into()).is_retryable());
}

#[test]
fn test_optimizer_error_from_serde() {
    let parse_err = serde_json::from_str::<u32>("\"text\"").unwrap_err();
    let err: OptimizerError = parse_err.into();
    assert!(matches!(err, OptimizerError::Serialization(_)));
    assert!(err.to_string().starts_with("serialization failed"));
}
