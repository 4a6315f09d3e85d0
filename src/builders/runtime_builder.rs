//! Build a scheduler and optimizer pair from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::SchedulerConfig;
use crate::core::{SchedulerError, Spawn, TaskExecutor, TaskScheduler};
use crate::optimizer::PerformanceOptimizer;

/// A scheduler and an optimizer sharing one profiler and load balancer.
pub struct GovernorRuntime<P, R, E, S> {
    /// Task scheduler.
    pub scheduler: TaskScheduler<P, R, E, S>,
    /// Optimizer for work performed inside tasks.
    pub optimizer: Arc<PerformanceOptimizer>,
}

impl<P, R, E, S> GovernorRuntime<P, R, E, S>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Start the health ticker and the cache sweeper.
    pub fn start(&self) {
        self.scheduler.start();
        self.optimizer.start_maintenance(self.scheduler.spawner());
    }
}

/// Validate `cfg` and wire a scheduler and optimizer from it.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` if the configuration does not validate.
pub fn build_runtime<P, R, E, S>(
    cfg: SchedulerConfig,
    executor: E,
    spawner: S,
) -> Result<GovernorRuntime<P, R, E, S>, SchedulerError>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

    let optimizer_cfg = cfg.optimizer.clone();
    let scheduler = TaskScheduler::new(cfg, executor, spawner)?;
    let optimizer = PerformanceOptimizer::with_parts(
        optimizer_cfg,
        scheduler.profiler(),
        scheduler.load_balancer().clone(),
    );
    info!(
        workers = scheduler.stats().total_workers,
        max_cache_size = optimizer.config().max_cache_size,
        "governor runtime built"
    );

    Ok(GovernorRuntime {
        scheduler,
        optimizer: Arc::new(optimizer),
    })
}

/// Like [`build_runtime`], reading configuration through [`SchedulerConfig::from_env`].
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` if loading or validation fails.
pub fn build_runtime_from_env<P, R, E, S>(
    executor: E,
    spawner: S,
) -> Result<GovernorRuntime<P, R, E, S>, SchedulerError>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let cfg = SchedulerConfig::from_env().map_err(SchedulerError::InvalidConfig)?;
    build_runtime(cfg, executor, spawner)
}
