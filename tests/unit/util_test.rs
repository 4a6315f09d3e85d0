//! Tests for utility functions

use prometheus_task_governor::util::{init_tracing, now_ms, DEFAULT_LOG_DIRECTIVE};

#[test]
fn test_now_ms_is_wall_clock() {
    // 2020-01-01T00:00:00Z
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing();
    init_tracing();
    tracing::info!(directive = DEFAULT_LOG_DIRECTIVE, "tracing initialized");
}
