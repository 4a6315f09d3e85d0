//! Pool statistics and lock-free counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Statistics about pool utilization and throughput.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total workers.
    pub total_workers: usize,
    /// Workers with status `idle`.
    pub idle_workers: usize,
    /// Workers with status `busy`.
    pub busy_workers: usize,
    /// Workers with status `error`.
    pub error_workers: usize,
    /// Workers with status `offline`.
    pub offline_workers: usize,
    /// Tasks waiting in the queue.
    pub queued_tasks: usize,
    /// Attempts currently executing.
    pub running_tasks: usize,
    /// Tasks sleeping before a retry.
    pub retrying_tasks: usize,
    /// Total tasks submitted.
    pub submitted_tasks: u64,
    /// Tasks completed successfully.
    pub completed_tasks: u64,
    /// Tasks that failed terminally.
    pub failed_tasks: u64,
    /// Tasks cancelled because of failed dependencies.
    pub cancelled_tasks: u64,
    /// Attempts that timed out.
    pub timed_out_attempts: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// Completed tasks per second since the scheduler was created.
    pub throughput_per_sec: f64,
    /// Mean duration of successful attempts.
    pub avg_duration_ms: f64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub timed_out_attempts: AtomicU64,
    pub retries: AtomicU64,
    pub success_duration_ms: AtomicU64,
}

impl PoolCounters {
    /// Fill the counter-backed fields of `stats`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(&self, stats: &mut PoolStats, elapsed_secs: f64) {
        stats.submitted_tasks = self.submitted_tasks.load(Ordering::Relaxed);
        stats.completed_tasks = self.completed_tasks.load(Ordering::Relaxed);
        stats.failed_tasks = self.failed_tasks.load(Ordering::Relaxed);
        stats.cancelled_tasks = self.cancelled_tasks.load(Ordering::Relaxed);
        stats.timed_out_attempts = self.timed_out_attempts.load(Ordering::Relaxed);
        stats.retries = self.retries.load(Ordering::Relaxed);

        let total_ms = self.success_duration_ms.load(Ordering::Relaxed);
        if stats.completed_tasks > 0 {
            stats.avg_duration_ms = total_ms as f64 / stats.completed_tasks as f64;
        }
        if elapsed_secs > 0.0 {
            stats.throughput_per_sec = stats.completed_tasks as f64 / elapsed_secs;
        }
    }

    pub fn record_success(&self, duration_ms: u64) {
        self.completed_tasks.fetch_add(1, Ordering::Relaxed);
        self.success_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }
}
