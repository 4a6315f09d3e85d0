//! Configuration models for the scheduler, worker pool, and optimizer.

pub mod optimizer;
pub mod pool;

pub use optimizer::OptimizerConfig;
pub use pool::{DistributionConfig, PoolConfig, RetryConfig, SchedulerConfig};
