//! Pool, distribution, retry, and root scheduler configuration structures.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::core::{AgentKind, DistributionStrategy};

/// Worker pool bounds and health-tick cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Workers created at startup and kept by scale-down.
    pub min_workers: usize,
    /// Upper bound for scale-up.
    pub max_workers: usize,
    /// Run the auto-scaler on each health tick.
    pub auto_scale: bool,
    /// Busy ratio at or above which the pool grows.
    pub scale_up_threshold: f64,
    /// Busy ratio at or below which the pool shrinks.
    pub scale_down_threshold: f64,
    /// Attempts running longer than this are treated as timed out.
    pub worker_timeout_ms: u64,
    /// Health tick period.
    pub health_check_interval_ms: u64,
    /// Concurrent tasks per worker.
    pub max_concurrent_tasks: usize,
    /// Health ticks a worker stays in `error` before returning to idle.
    pub error_recovery_ticks: u32,
    /// Agent kinds cycled through when creating workers.
    pub agent_kinds: Vec<AgentKind>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 10,
            auto_scale: true,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.2,
            worker_timeout_ms: 300_000,
            health_check_interval_ms: 5_000,
            max_concurrent_tasks: 1,
            error_recovery_ticks: 1,
            agent_kinds: vec![
                AgentKind::CodeGen,
                AgentKind::Review,
                AgentKind::Test,
                AgentKind::Coordinator,
                AgentKind::Deploy,
                AgentKind::Issue,
            ],
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.min_workers > self.max_workers {
            return Err(format!(
                "min_workers ({}) must not exceed max_workers ({})",
                self.min_workers, self.max_workers
            ));
        }
        if !(0.0..=1.0).contains(&self.scale_up_threshold)
            || !(0.0..=1.0).contains(&self.scale_down_threshold)
        {
            return Err("scale thresholds must be within [0, 1]".into());
        }
        if self.scale_down_threshold >= self.scale_up_threshold {
            return Err("scale_down_threshold must be below scale_up_threshold".into());
        }
        if self.worker_timeout_ms == 0 {
            return Err("worker_timeout_ms must be greater than 0".into());
        }
        if self.health_check_interval_ms == 0 {
            return Err("health_check_interval_ms must be greater than 0".into());
        }
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.error_recovery_ticks == 0 {
            return Err("error_recovery_ticks must be greater than 0".into());
        }
        Ok(())
    }
}

/// Worker selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Selection rule.
    pub strategy: DistributionStrategy,
    /// Task type to the skills it requires, used by `skill-based`.
    pub skill_map: HashMap<String, Vec<String>>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        let entries: [(&str, &[&str]); 9] = [
            ("feature", &["code-generation"]),
            ("bug", &["bug-fix"]),
            ("refactor", &["refactoring"]),
            ("review", &["code-review", "quality-analysis"]),
            ("test", &["testing", "coverage"]),
            ("deployment", &["deployment", "release"]),
            ("triage", &["triage", "labeling"]),
            ("planning", &["planning", "decomposition"]),
            ("security", &["security-audit"]),
        ];
        let skill_map = entries
            .into_iter()
            .map(|(task_type, skills)| {
                (
                    task_type.to_string(),
                    skills.iter().map(|s| (*s).to_string()).collect(),
                )
            })
            .collect();

        Self {
            strategy: DistributionStrategy::default(),
            skill_map,
        }
    }
}

/// Retry and backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt before a task fails terminally.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay_ms: u64,
    /// Growth factor per retry.
    pub backoff_multiplier: f64,
    /// Cap on any single delay.
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_retry_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Validate retry configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be a finite value >= 1.0".into());
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return Err("max_retry_delay_ms must be >= retry_delay_ms".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker pool settings.
    pub pool: PoolConfig,
    /// Distribution settings.
    pub distribution: DistributionConfig,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Cache, rate-limit, batching, and metrics settings.
    pub optimizer: OptimizerConfig,
}

impl SchedulerConfig {
    /// Validate every group.
    ///
    /// # Errors
    ///
    /// Returns the first failing group, prefixed with its name.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        self.retry.validate().map_err(|e| format!("retry invalid: {e}"))?;
        self.optimizer
            .validate()
            .map_err(|e| format!("optimizer invalid: {e}"))?;
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on malformed JSON or invalid values. An unrecognized
    /// strategy name is reported as `unknown strategy: <name>`.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment.
    ///
    /// Reads `.env` if present, then the JSON file named by `GOVERNOR_CONFIG`
    /// (defaults otherwise), then applies `GOVERNOR_*` overrides. Every scalar
    /// setting has an override named after its field, e.g.
    /// `GOVERNOR_SCALE_UP_THRESHOLD` or `GOVERNOR_BATCH_DELAY_MS`. Agent kinds,
    /// the skill map, and the cache eviction policy are set through the file.
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be read, a variable fails to
    /// parse, or the result does not validate.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let mut cfg = match std::env::var("GOVERNOR_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        let pool = &mut cfg.pool;
        env_override("GOVERNOR_MIN_WORKERS", &mut pool.min_workers)?;
        env_override("GOVERNOR_MAX_WORKERS", &mut pool.max_workers)?;
        env_override("GOVERNOR_AUTO_SCALE", &mut pool.auto_scale)?;
        env_override("GOVERNOR_SCALE_UP_THRESHOLD", &mut pool.scale_up_threshold)?;
        env_override("GOVERNOR_SCALE_DOWN_THRESHOLD", &mut pool.scale_down_threshold)?;
        env_override("GOVERNOR_WORKER_TIMEOUT_MS", &mut pool.worker_timeout_ms)?;
        env_override(
            "GOVERNOR_HEALTH_CHECK_INTERVAL_MS",
            &mut pool.health_check_interval_ms,
        )?;
        env_override("GOVERNOR_MAX_CONCURRENT_TASKS", &mut pool.max_concurrent_tasks)?;
        env_override("GOVERNOR_ERROR_RECOVERY_TICKS", &mut pool.error_recovery_ticks)?;

        env_override("GOVERNOR_STRATEGY", &mut cfg.distribution.strategy)?;

        let retry = &mut cfg.retry;
        env_override("GOVERNOR_MAX_RETRIES", &mut retry.max_retries)?;
        env_override("GOVERNOR_RETRY_DELAY_MS", &mut retry.retry_delay_ms)?;
        env_override("GOVERNOR_BACKOFF_MULTIPLIER", &mut retry.backoff_multiplier)?;
        env_override("GOVERNOR_MAX_RETRY_DELAY_MS", &mut retry.max_retry_delay_ms)?;

        let optimizer = &mut cfg.optimizer;
        env_override("GOVERNOR_CACHE_TTL_MS", &mut optimizer.cache_ttl_ms)?;
        env_override("GOVERNOR_MAX_CACHE_SIZE", &mut optimizer.max_cache_size)?;
        env_override(
            "GOVERNOR_CACHE_SWEEP_INTERVAL_MS",
            &mut optimizer.cache_sweep_interval_ms,
        )?;
        env_override("GOVERNOR_RATE_LIMIT_BUFFER", &mut optimizer.rate_limit_buffer)?;
        env_override("GOVERNOR_BATCH_SIZE", &mut optimizer.batch_size)?;
        env_override("GOVERNOR_BATCH_DELAY_MS", &mut optimizer.batch_delay_ms)?;
        env_override("GOVERNOR_MAX_CONCURRENCY", &mut optimizer.max_concurrency)?;
        env_override("GOVERNOR_QUEUE_MAX_SIZE", &mut optimizer.queue_max_size)?;
        env_override("GOVERNOR_METRICS_ENABLED", &mut optimizer.metrics_enabled)?;
        env_override("GOVERNOR_LOAD_BALANCING", &mut optimizer.load_balancing)?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_json_str(&raw)
    }
}

fn env_override<T>(key: &str, target: &mut T) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}={raw}: {e}"))?;
    }
    Ok(())
}
