//! Operation timing with a bounded in-memory history.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::util::clock::now_ms;

/// Entries kept before the oldest are dropped.
pub const DEFAULT_METRICS_CAPACITY: usize = 1_000;

/// One recorded operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    /// Operation name.
    pub name: String,
    /// Start, ms since epoch.
    pub started_at_ms: u64,
    /// End, ms since epoch.
    pub ended_at_ms: u64,
    /// Wall time spent.
    pub duration_ms: u64,
    /// Whether the operation returned `Ok`.
    pub success: bool,
    /// Whether it was served from cache, when known.
    pub cache_hit: Option<bool>,
}

/// Aggregates over the retained metrics of one operation name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSummary {
    /// Recorded operations.
    pub count: usize,
    /// Operations that returned `Err`.
    pub failures: usize,
    /// Fastest.
    pub min_ms: u64,
    /// Slowest.
    pub max_ms: u64,
    /// Mean duration.
    pub avg_ms: f64,
    /// Share of cache-aware operations that hit; `None` when none were.
    pub cache_hit_rate: Option<f64>,
}

/// Records operation metrics into a ring buffer.
pub struct MetricsProfiler {
    enabled: AtomicBool,
    capacity: usize,
    metrics: Mutex<VecDeque<OperationMetric>>,
}

impl MetricsProfiler {
    /// Create a profiler keeping the latest `capacity` metrics.
    #[must_use]
    pub fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            capacity: capacity.max(1),
            metrics: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_METRICS_CAPACITY))),
        }
    }

    /// Whether metrics are recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn recording on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Time `fut` under `name` and record the outcome, success or error.
    ///
    /// # Errors
    ///
    /// Returns the future's own error unchanged.
    pub async fn profile<F, T, E>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.profile_with(name, None, fut).await
    }

    /// Like [`profile`](Self::profile), tagging the metric with a cache outcome.
    ///
    /// # Errors
    ///
    /// Returns the future's own error unchanged.
    pub async fn profile_with<F, T, E>(
        &self,
        name: &str,
        cache_hit: Option<bool>,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.is_enabled() {
            return fut.await;
        }
        let started_at_ms = now_ms();
        let started = Instant::now();
        let result = fut.await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.record(OperationMetric {
            name: name.to_string(),
            started_at_ms,
            ended_at_ms: started_at_ms.saturating_add(duration_ms),
            duration_ms,
            success: result.is_ok(),
            cache_hit,
        });
        result
    }

    /// Append a metric, dropping the oldest when full.
    pub fn record(&self, metric: OperationMetric) {
        if !self.is_enabled() {
            return;
        }
        let mut metrics = self.metrics.lock();
        if metrics.len() >= self.capacity {
            metrics.pop_front();
        }
        metrics.push_back(metric);
    }

    /// Retained metrics, oldest first.
    #[must_use]
    pub fn metrics(&self) -> Vec<OperationMetric> {
        self.metrics.lock().iter().cloned().collect()
    }

    /// Number of retained metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.lock().len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all retained metrics.
    pub fn clear(&self) {
        self.metrics.lock().clear();
    }

    /// Per-name aggregates over the retained metrics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> BTreeMap<String, OperationSummary> {
        let metrics = self.metrics.lock();
        let mut grouped: BTreeMap<&str, Vec<&OperationMetric>> = BTreeMap::new();
        for metric in metrics.iter() {
            grouped.entry(metric.name.as_str()).or_default().push(metric);
        }

        grouped
            .into_iter()
            .map(|(name, group)| {
                let count = group.len();
                let total: u64 = group.iter().map(|m| m.duration_ms).sum();
                let cache_aware: Vec<bool> = group.iter().filter_map(|m| m.cache_hit).collect();
                let cache_hit_rate = if cache_aware.is_empty() {
                    None
                } else {
                    let hits = cache_aware.iter().filter(|hit| **hit).count();
                    Some(hits as f64 / cache_aware.len() as f64)
                };
                let summary = OperationSummary {
                    count,
                    failures: group.iter().filter(|m| !m.success).count(),
                    min_ms: group.iter().map(|m| m.duration_ms).min().unwrap_or(0),
                    max_ms: group.iter().map(|m| m.duration_ms).max().unwrap_or(0),
                    avg_ms: total as f64 / count as f64,
                    cache_hit_rate,
                };
                (name.to_string(), summary)
            })
            .collect()
    }
}

impl Default for MetricsProfiler {
    fn default() -> Self {
        Self::new(true, DEFAULT_METRICS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn metric(name: &str, duration_ms: u64, success: bool, cache_hit: Option<bool>) -> OperationMetric {
        OperationMetric {
            name: name.to_string(),
            started_at_ms: 0,
            ended_at_ms: duration_ms,
            duration_ms,
            success,
            cache_hit,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_records_errors_too() {
        let profiler = MetricsProfiler::default();
        let ok: Result<u8, String> = profiler
            .profile("fetch", async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(1)
            })
            .await;
        let err: Result<u8, String> = profiler.profile("fetch", async { Err("x".into()) }).await;
        assert!(ok.is_ok());
        assert!(err.is_err());

        let summary = profiler.summary();
        let fetch = &summary["fetch"];
        assert_eq!(fetch.count, 2);
        assert_eq!(fetch.failures, 1);
        assert_eq!(fetch.max_ms, 30);
        assert_eq!(fetch.min_ms, 0);
    }

    #[test]
    fn test_ring_buffer_keeps_latest() {
        let profiler = MetricsProfiler::new(true, 3);
        for i in 0..5 {
            profiler.record(metric(&format!("op{i}"), i, true, None));
        }
        let names: Vec<_> = profiler.metrics().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["op2", "op3", "op4"]);
    }

    #[test]
    fn test_summary_cache_hit_rate() {
        let profiler = MetricsProfiler::default();
        profiler.record(metric("cache", 1, true, Some(true)));
        profiler.record(metric("cache", 3, true, Some(false)));
        profiler.record(metric("plain", 2, true, None));

        let summary = profiler.summary();
        assert_eq!(summary["cache"].cache_hit_rate, Some(0.5));
        assert!((summary["cache"].avg_ms - 2.0).abs() < f64::EPSILON);
        assert_eq!(summary["plain"].cache_hit_rate, None);
    }

    #[test]
    fn test_disabled_profiler_records_nothing() {
        let profiler = MetricsProfiler::new(false, 10);
        profiler.record(metric("op", 1, true, None));
        assert!(profiler.is_empty());
    }
}
