//! Performance optimizer: caching, rate limiting, deduplication, bounded
//! concurrency, batching, profiling, and load balancing behind one facade.

pub mod cache;
pub mod concurrency;
pub mod dedup;
pub mod load_balancer;
pub mod profiler;
pub mod rate_limiter;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::OptimizerConfig;
use crate::core::{AppResult, Spawn};

pub use cache::{CacheEntry, CacheStats, EvictionPolicy, TtlCache};
pub use concurrency::{batch_process, parallel_execute};
pub use dedup::Deduplicator;
pub use load_balancer::{AgentLoad, BalancingStrategy, LoadBalancer, LoadLease};
pub use profiler::{MetricsProfiler, OperationMetric, OperationSummary, DEFAULT_METRICS_CAPACITY};
pub use rate_limiter::{QuotaSource, RateLimitSnapshot, RateLimiter};

/// Errors returned by optimizer facade operations.
///
/// Cloneable so one failure can be handed to every deduplicated caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptimizerError {
    /// The wrapped operation failed.
    #[error("operation failed: {0}")]
    Operation(String),
    /// A value could not be converted to or from its cached JSON form.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl OptimizerError {
    fn operation(err: &anyhow::Error) -> Self {
        Self::Operation(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for OptimizerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Point-in-time view of every optimizer component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerDiagnostics {
    /// Cache counters.
    pub cache: CacheStats,
    /// Last known quota per resource.
    pub rate_limits: HashMap<String, RateLimitSnapshot>,
    /// Deduplication keys currently executing.
    pub dedup_in_flight: usize,
    /// Per-operation metric aggregates.
    pub metrics: BTreeMap<String, OperationSummary>,
    /// Metrics currently retained.
    pub metrics_recorded: usize,
    /// Load per agent.
    pub load: BTreeMap<String, AgentLoad>,
    /// Active load-balancing strategy.
    pub load_balancing: BalancingStrategy,
}

/// Facade owning one instance of each optimizer component.
pub struct PerformanceOptimizer {
    config: OptimizerConfig,
    cache: Arc<TtlCache<Value>>,
    rate_limiter: RateLimiter,
    dedup: Deduplicator<Value, OptimizerError>,
    profiler: Arc<MetricsProfiler>,
    balancer: LoadBalancer,
    sweeper: Mutex<Option<watch::Sender<bool>>>,
}

impl PerformanceOptimizer {
    /// Create an optimizer with its own profiler and load balancer.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        let profiler = Arc::new(MetricsProfiler::new(
            config.metrics_enabled,
            DEFAULT_METRICS_CAPACITY,
        ));
        let balancer = LoadBalancer::new(config.load_balancing);
        Self::with_parts(config, profiler, balancer)
    }

    /// Create an optimizer sharing a profiler and load balancer, typically the
    /// scheduler's, so one diagnostics snapshot covers both.
    #[must_use]
    pub fn with_parts(
        config: OptimizerConfig,
        profiler: Arc<MetricsProfiler>,
        balancer: LoadBalancer,
    ) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.max_cache_size,
                config.cache_eviction,
            )),
            rate_limiter: RateLimiter::new(config.rate_limit_buffer),
            dedup: Deduplicator::new(),
            profiler,
            balancer,
            sweeper: Mutex::new(None),
            config,
        }
    }

    /// Serve `key` from the cache or compute it with `f`.
    ///
    /// Values are stored as JSON so one cache can hold heterogeneous results.
    /// Failures of `f` are not cached. Each call is profiled as `cache`.
    ///
    /// # Errors
    ///
    /// - `OptimizerError::Operation` if `f` fails
    /// - `OptimizerError::Serialization` if the value does not round-trip
    pub async fn with_cache<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        f: F,
    ) -> Result<T, OptimizerError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let hit = self.cache.contains(key);
        let value = self
            .profiler
            .profile_with(
                "cache",
                Some(hit),
                self.cache.get_or_insert_with(key, ttl, || async {
                    let computed = f().await.map_err(|e| OptimizerError::operation(&e))?;
                    Ok::<_, OptimizerError>(serde_json::to_value(computed)?)
                }),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run `f` against `resource` under the rate limiter.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub async fn with_rate_limit<T, E, F, Fut>(&self, resource: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.rate_limiter.with_rate_limit(resource, f).await
    }

    /// Collapse concurrent calls sharing `key` into one execution of `f`.
    ///
    /// # Errors
    ///
    /// Returns the shared `OptimizerError` of the single execution.
    pub async fn with_deduplication<T, F, Fut>(&self, key: &str, f: F) -> Result<T, OptimizerError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let value = self
            .dedup
            .run(key, move || {
                let fut = f();
                async move {
                    let computed = fut.await.map_err(|e| OptimizerError::operation(&e))?;
                    Ok(serde_json::to_value(computed)?)
                }
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run `tasks` with at most `limit` (default `max_concurrency`) in flight.
    pub async fn parallel_execute<I, F, Fut, T, E>(
        &self,
        tasks: I,
        limit: Option<usize>,
    ) -> Vec<Result<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        parallel_execute(tasks, limit.unwrap_or(self.config.max_concurrency)).await
    }

    /// Process `items` in configured batches with the configured delay.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`; no partial results.
    pub async fn batch_process<T, O, E, F, Fut>(&self, items: Vec<T>, f: F) -> Result<Vec<O>, E>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<O, E>>,
    {
        batch_process(
            items,
            self.config.batch_size,
            Duration::from_millis(self.config.batch_delay_ms),
            f,
        )
        .await
    }

    /// Time `fut` under `name`.
    ///
    /// # Errors
    ///
    /// Returns the future's own error unchanged.
    pub async fn profile<F, T, E>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.profiler.profile(name, fut).await
    }

    /// Per-operation aggregates.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, OperationSummary> {
        self.profiler.summary()
    }

    /// Snapshot of cache, quota, dedup, metrics, and load state.
    #[must_use]
    pub fn diagnostics(&self) -> OptimizerDiagnostics {
        OptimizerDiagnostics {
            cache: self.cache.stats(),
            rate_limits: self.rate_limiter.snapshots(),
            dedup_in_flight: self.dedup.in_flight_count(),
            metrics: self.profiler.summary(),
            metrics_recorded: self.profiler.len(),
            load: self.balancer.snapshot(),
            load_balancing: self.balancer.strategy(),
        }
    }

    /// Start the periodic expired-entry sweep on `spawner`. Calling it again
    /// has no effect while the sweep is running.
    pub fn start_maintenance<S: Spawn>(&self, spawner: &S) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|stop| !stop.is_closed()) {
            return;
        }
        let interval = Duration::from_millis(self.config.cache_sweep_interval_ms);
        *sweeper = Some(self.cache.spawn_sweeper(interval, spawner));
        info!(interval_ms = self.config.cache_sweep_interval_ms, "cache maintenance started");
    }

    /// Stop the periodic sweep.
    pub fn stop_maintenance(&self) {
        if let Some(stop) = self.sweeper.lock().take() {
            stop.send_replace(true);
            debug!("cache maintenance stopped");
        }
    }

    /// The cache.
    #[must_use]
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    /// The rate limiter.
    #[must_use]
    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The profiler.
    #[must_use]
    pub fn profiler(&self) -> Arc<MetricsProfiler> {
        Arc::clone(&self.profiler)
    }

    /// The load balancer.
    #[must_use]
    pub const fn load_balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

impl Drop for PerformanceOptimizer {
    fn drop(&mut self) {
        self.stop_maintenance();
    }
}
