//! Tests for configuration validation

use prometheus_task_governor::config::{
    OptimizerConfig, PoolConfig, RetryConfig, SchedulerConfig,
};
use prometheus_task_governor::core::{AgentKind, DistributionStrategy};
use prometheus_task_governor::optimizer::{BalancingStrategy, EvictionPolicy};

#[test]
fn test_pool_config_validation() {
    let valid = PoolConfig::default();
    assert!(valid.validate().is_ok());
    assert_eq!(valid.min_workers, 2);
    assert_eq!(valid.max_workers, 10);
    assert_eq!(valid.agent_kinds.len(), AgentKind::ALL.len());
}

#[test]
fn test_pool_config_min_above_max() {
    let invalid = PoolConfig {
        min_workers: 5,
        max_workers: 3,
        ..PoolConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("min_workers"));
}

#[test]
fn test_pool_config_inverted_thresholds() {
    let invalid = PoolConfig {
        scale_up_threshold: 0.2,
        scale_down_threshold: 0.8,
        ..PoolConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_zero_timeout() {
    let invalid = PoolConfig {
        worker_timeout_ms: 0,
        ..PoolConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_retry_config_validation() {
    assert!(RetryConfig::default().validate().is_ok());

    let shrinking = RetryConfig {
        backoff_multiplier: 0.5,
        ..RetryConfig::default()
    };
    assert!(shrinking.validate().is_err());

    let capped_below_base = RetryConfig {
        retry_delay_ms: 5_000,
        max_retry_delay_ms: 1_000,
        ..RetryConfig::default()
    };
    assert!(capped_below_base.validate().is_err());
}

#[test]
fn test_optimizer_config_defaults() {
    let cfg = OptimizerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.cache_ttl_ms, 300_000);
    assert_eq!(cfg.max_cache_size, 1_000);
    assert_eq!(cfg.rate_limit_buffer, 100);
    assert_eq!(cfg.cache_eviction, EvictionPolicy::InsertionOrder);
    assert_eq!(cfg.load_balancing, BalancingStrategy::LeastLoaded);
    assert!(cfg.max_concurrency >= 2);

    let invalid = OptimizerConfig {
        batch_size: 0,
        ..OptimizerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "pool": { "min_workers": 1, "max_workers": 4, "auto_scale": false },
        "distribution": { "strategy": "skill-based" },
        "retry": { "max_retries": 5 },
        "optimizer": { "cache_eviction": "least-recently-used", "load_balancing": "round-robin" }
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.pool.min_workers, 1);
    assert_eq!(cfg.pool.max_workers, 4);
    assert!(!cfg.pool.auto_scale);
    assert_eq!(cfg.pool.worker_timeout_ms, 300_000);
    assert_eq!(cfg.distribution.strategy, DistributionStrategy::SkillBased);
    assert!(cfg.distribution.skill_map.contains_key("feature"));
    assert_eq!(cfg.retry.max_retries, 5);
    assert_eq!(cfg.retry.retry_delay_ms, 1_000);
    assert_eq!(cfg.optimizer.cache_eviction, EvictionPolicy::LeastRecentlyUsed);
    assert_eq!(cfg.optimizer.load_balancing, BalancingStrategy::RoundRobin);
}

#[test]
fn test_scheduler_config_rejects_invalid_json() {
    let err = SchedulerConfig::from_json_str(r#"{ "pool": { "max_workers": 0 } }"#).unwrap_err();
    assert!(err.starts_with("pool invalid"));

    let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));

    let err =
        SchedulerConfig::from_json_str(r#"{ "distribution": { "strategy": "fastest" } }"#)
            .unwrap_err();
    assert!(err.contains("unknown strategy: fastest"));

    let err =
        SchedulerConfig::from_json_str(r#"{ "optimizer": { "load_balancing": "busiest" } }"#)
            .unwrap_err();
    assert!(err.contains("unknown strategy: busiest"));
}

#[test]
fn test_scheduler_config_from_env_overrides() {
    let vars = [
        ("GOVERNOR_SCALE_UP_THRESHOLD", "0.9"),
        ("GOVERNOR_SCALE_DOWN_THRESHOLD", "0.1"),
        ("GOVERNOR_BACKOFF_MULTIPLIER", "3"),
        ("GOVERNOR_MAX_RETRY_DELAY_MS", "5000"),
        ("GOVERNOR_CACHE_TTL_MS", "1500"),
        ("GOVERNOR_MAX_CACHE_SIZE", "64"),
        ("GOVERNOR_RATE_LIMIT_BUFFER", "25"),
        ("GOVERNOR_BATCH_SIZE", "4"),
        ("GOVERNOR_BATCH_DELAY_MS", "250"),
        ("GOVERNOR_LOAD_BALANCING", "random"),
    ];
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let loaded = SchedulerConfig::from_env();

    std::env::set_var("GOVERNOR_STRATEGY", "fastest");
    let rejected = SchedulerConfig::from_env();

    std::env::remove_var("GOVERNOR_STRATEGY");
    for (key, _) in vars {
        std::env::remove_var(key);
    }

    let cfg = loaded.unwrap();
    assert!((cfg.pool.scale_up_threshold - 0.9).abs() < f64::EPSILON);
    assert!((cfg.pool.scale_down_threshold - 0.1).abs() < f64::EPSILON);
    assert!((cfg.retry.backoff_multiplier - 3.0).abs() < f64::EPSILON);
    assert_eq!(cfg.retry.max_retry_delay_ms, 5_000);
    assert_eq!(cfg.optimizer.cache_ttl_ms, 1_500);
    assert_eq!(cfg.optimizer.max_cache_size, 64);
    assert_eq!(cfg.optimizer.rate_limit_buffer, 25);
    assert_eq!(cfg.optimizer.batch_size, 4);
    assert_eq!(cfg.optimizer.batch_delay_ms, 250);
    assert_eq!(cfg.optimizer.load_balancing, BalancingStrategy::Random);

    let err = rejected.unwrap_err();
    assert!(err.contains("GOVERNOR_STRATEGY=fastest"));
    assert!(err.contains("unknown strategy: fastest"));
}

#[test]
fn test_scheduler_config_from_file() {
    let path = std::env::temp_dir().join(format!("governor-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "retry": { "max_retries": 7 } }"#).unwrap();
    let cfg = SchedulerConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(cfg.retry.max_retries, 7);

    assert!(SchedulerConfig::from_file("/nonexistent/governor.json").is_err());
}
