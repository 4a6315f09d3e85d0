//! Cache, rate-limit, batching, and metrics configuration.

use serde::{Deserialize, Serialize};

use crate::optimizer::{BalancingStrategy, EvictionPolicy};

/// Settings for the performance optimizer and the scheduler queue bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Default cache entry lifetime.
    pub cache_ttl_ms: u64,
    /// Maximum cache entries.
    pub max_cache_size: usize,
    /// Which entry to evict when the cache overflows.
    pub cache_eviction: EvictionPolicy,
    /// Period of the expired-entry sweeper.
    pub cache_sweep_interval_ms: u64,
    /// Remaining quota at or below which callers wait for the reset.
    pub rate_limit_buffer: u64,
    /// Items per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay_ms: u64,
    /// Default limit for the bounded concurrency runner.
    pub max_concurrency: usize,
    /// Maximum queued tasks before submissions are rejected.
    pub queue_max_size: usize,
    /// Record operation metrics.
    pub metrics_enabled: bool,
    /// Selection rule of the load balancer.
    pub load_balancing: BalancingStrategy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 300_000,
            max_cache_size: 1_000,
            cache_eviction: EvictionPolicy::default(),
            cache_sweep_interval_ms: 60_000,
            rate_limit_buffer: 100,
            batch_size: 10,
            batch_delay_ms: 1_000,
            max_concurrency: num_cpus::get().max(1) * 2,
            queue_max_size: 10_000,
            metrics_enabled: true,
            load_balancing: BalancingStrategy::default(),
        }
    }
}

impl OptimizerConfig {
    /// Validate optimizer configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size == 0 {
            return Err("max_cache_size must be greater than 0".into());
        }
        if self.cache_sweep_interval_ms == 0 {
            return Err("cache_sweep_interval_ms must be greater than 0".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".into());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        if self.queue_max_size == 0 {
            return Err("queue_max_size must be greater than 0".into());
        }
        Ok(())
    }
}
