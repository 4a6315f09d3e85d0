//! Worker records, agent kinds, and the worker pool with its scaling rules.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::SchedulerError;
use crate::util::clock::now_ms;

/// Worker identifier.
pub type WorkerId = String;

/// Kind of automated agent a worker represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Plans and decomposes work items.
    Coordinator,
    /// Writes and fixes code.
    CodeGen,
    /// Reviews changes.
    Review,
    /// Runs verification suites.
    Test,
    /// Ships releases.
    Deploy,
    /// Triages and labels issues.
    Issue,
}

impl AgentKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Coordinator,
        Self::CodeGen,
        Self::Review,
        Self::Test,
        Self::Deploy,
        Self::Issue,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::CodeGen => "codegen",
            Self::Review => "review",
            Self::Test => "test",
            Self::Deploy => "deploy",
            Self::Issue => "issue",
        }
    }

    /// Fixed skill set of this kind.
    #[must_use]
    pub const fn skills(self) -> &'static [&'static str] {
        match self {
            Self::Coordinator => &["planning", "decomposition", "coordination"],
            Self::CodeGen => &["code-generation", "refactoring", "bug-fix"],
            Self::Review => &["code-review", "quality-analysis", "security-audit"],
            Self::Test => &["testing", "coverage", "verification"],
            Self::Deploy => &["deployment", "release", "infrastructure"],
            Self::Issue => &["triage", "labeling", "analysis"],
        }
    }

    /// Weight used by priority-based distribution; higher wins.
    #[must_use]
    pub const fn priority_weight(self) -> u32 {
        match self {
            Self::Coordinator => 10,
            Self::CodeGen => 8,
            Self::Deploy => 7,
            Self::Review => 6,
            Self::Test => 5,
            Self::Issue => 4,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SchedulerError::InvalidConfig(format!("unknown agent kind `{s}`")))
    }
}

/// Worker availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// No tasks assigned.
    Idle,
    /// At least one task assigned.
    Busy,
    /// Last task timed out; waiting for health-tick recovery.
    Error,
    /// Not accepting work.
    Offline,
}

/// A logical execution slot with bounded concurrent task capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker identifier.
    pub id: WorkerId,
    /// Agent kind; determines skills and weight.
    pub agent_kind: AgentKind,
    /// Skills used for skill-based distribution.
    pub skills: BTreeSet<String>,
    /// Maximum tasks assigned at once.
    pub max_concurrent_tasks: usize,
    /// Tasks currently assigned.
    pub current_load: usize,
    /// Availability.
    pub status: WorkerStatus,
    /// Weight used by priority-based distribution.
    pub priority_weight: u32,
    /// Creation time, ms since epoch.
    pub created_at_ms: u64,
    /// Attempts finished successfully on this worker.
    pub completed_tasks: u64,
    /// Attempts that failed or timed out on this worker.
    pub failed_tasks: u64,
    #[serde(skip)]
    error_ticks: u32,
}

impl Worker {
    /// Create an idle worker of `kind`.
    pub fn new(id: impl Into<WorkerId>, kind: AgentKind, max_concurrent_tasks: usize) -> Self {
        Self {
            id: id.into(),
            agent_kind: kind,
            skills: kind.skills().iter().map(|s| (*s).to_string()).collect(),
            max_concurrent_tasks,
            current_load: 0,
            status: WorkerStatus::Idle,
            priority_weight: kind.priority_weight(),
            created_at_ms: now_ms(),
            completed_tasks: 0,
            failed_tasks: 0,
            error_ticks: 0,
        }
    }

    /// Whether the distributor may hand this worker a task.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.status == WorkerStatus::Idle && self.current_load < self.max_concurrent_tasks
    }

    /// Whether the worker has at least one of `required`.
    #[must_use]
    pub fn has_any_skill(&self, required: &[String]) -> bool {
        required.iter().any(|skill| self.skills.contains(skill))
    }

    /// Take one slot. Returns `false` when already at capacity.
    pub(crate) fn assign(&mut self) -> bool {
        if self.current_load >= self.max_concurrent_tasks {
            return false;
        }
        self.current_load += 1;
        self.status = WorkerStatus::Busy;
        true
    }

    /// Give back one slot after an attempt finished.
    pub(crate) fn release(&mut self, success: bool) {
        self.current_load = self.current_load.saturating_sub(1);
        if success {
            self.completed_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
        if matches!(self.status, WorkerStatus::Idle | WorkerStatus::Busy) {
            self.status = if self.current_load == 0 {
                WorkerStatus::Idle
            } else {
                WorkerStatus::Busy
            };
        }
    }

    /// Give back one slot after a timeout and flag the worker.
    pub(crate) fn mark_timed_out(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
        self.failed_tasks += 1;
        self.status = WorkerStatus::Error;
        self.error_ticks = 0;
    }
}

/// Outcome of an auto-scaling evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add this many workers.
    Up(usize),
    /// Remove up to this many idle workers.
    Down(usize),
    /// Leave the pool as is.
    Hold,
}

/// Owned set of workers.
///
/// Not synchronized on its own; the scheduler keeps it behind its state mutex.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    kinds: Vec<AgentKind>,
    next_kind: usize,
    next_seq: u64,
    max_concurrent_tasks: usize,
}

impl WorkerPool {
    /// Create an empty pool that spawns workers cycling through `kinds`.
    #[must_use]
    pub fn new(kinds: Vec<AgentKind>, max_concurrent_tasks: usize) -> Self {
        let kinds = if kinds.is_empty() {
            vec![AgentKind::CodeGen]
        } else {
            kinds
        };
        Self {
            workers: Vec::new(),
            kinds,
            next_kind: 0,
            next_seq: 0,
            max_concurrent_tasks,
        }
    }

    /// Create a pool pre-filled with `config.min_workers` workers.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        let mut pool = Self::new(config.agent_kinds.clone(), config.max_concurrent_tasks);
        for _ in 0..config.min_workers {
            pool.add_next_worker();
        }
        pool
    }

    /// Add a worker of `kind` and return its id.
    pub fn add_worker(&mut self, kind: AgentKind) -> WorkerId {
        self.next_seq += 1;
        let id = format!("{}-{:03}", kind.as_str(), self.next_seq);
        self.workers
            .push(Worker::new(id.clone(), kind, self.max_concurrent_tasks));
        debug!(worker_id = %id, kind = %kind, "worker added");
        id
    }

    /// Add a worker of the next configured kind.
    pub fn add_next_worker(&mut self) -> WorkerId {
        let kind = self.kinds[self.next_kind % self.kinds.len()];
        self.next_kind = self.next_kind.wrapping_add(1);
        self.add_worker(kind)
    }

    /// Remove an idle worker.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::WorkerNotFound` if `id` is unknown
    /// - `SchedulerError::WorkerBusy` if the worker is not idle
    pub fn remove_worker(&mut self, id: &str) -> Result<Worker, SchedulerError> {
        let idx = self
            .workers
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| SchedulerError::WorkerNotFound(id.to_string()))?;
        if self.workers[idx].status != WorkerStatus::Idle || self.workers[idx].current_load > 0 {
            return Err(SchedulerError::WorkerBusy(id.to_string()));
        }
        debug!(worker_id = %id, "worker removed");
        Ok(self.workers.remove(idx))
    }

    /// Look up a worker.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    /// All workers in creation order.
    #[must_use]
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of workers with status `busy`.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Busy)
            .count()
    }

    /// Count of workers with `status`.
    #[must_use]
    pub fn count_with(&self, status: WorkerStatus) -> usize {
        self.workers.iter().filter(|w| w.status == status).count()
    }

    /// Busy workers over total workers; `0.0` for an empty pool.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn load_ratio(&self) -> f64 {
        if self.workers.is_empty() {
            return 0.0;
        }
        self.active_count() as f64 / self.workers.len() as f64
    }

    /// Age error workers by one tick and return those that recovered.
    ///
    /// A worker recovers once it has spent `recovery_ticks` ticks in `error`.
    /// Nothing verifies that the underlying fault cleared.
    pub fn recover_errored(&mut self, recovery_ticks: u32) -> Vec<WorkerId> {
        let mut recovered = Vec::new();
        for worker in &mut self.workers {
            if worker.status != WorkerStatus::Error {
                continue;
            }
            worker.error_ticks += 1;
            if worker.error_ticks >= recovery_ticks {
                worker.error_ticks = 0;
                worker.status = if worker.current_load == 0 {
                    WorkerStatus::Idle
                } else {
                    WorkerStatus::Busy
                };
                recovered.push(worker.id.clone());
            }
        }
        recovered
    }

    /// Evaluate the threshold rules against the current pool.
    #[must_use]
    pub fn scale_decision(&self, config: &PoolConfig) -> ScaleDecision {
        let total = self.workers.len();
        let active = self.active_count();
        let ratio = self.load_ratio();

        if ratio >= config.scale_up_threshold && total < config.max_workers {
            let add = total.div_ceil(2).max(1).min(config.max_workers - total);
            return ScaleDecision::Up(add);
        }
        if ratio <= config.scale_down_threshold && total > config.min_workers {
            let remove = (total - active).div_ceil(2).min(total - config.min_workers);
            if remove > 0 {
                return ScaleDecision::Down(remove);
            }
        }
        ScaleDecision::Hold
    }

    /// Apply the scaling rules; returns the net change in worker count.
    pub fn auto_scale(&mut self, config: &PoolConfig) -> isize {
        match self.scale_decision(config) {
            ScaleDecision::Up(n) => {
                for _ in 0..n {
                    self.add_next_worker();
                }
                info!(added = n, total = self.len(), "scaled worker pool up");
                n.cast_signed()
            }
            ScaleDecision::Down(n) => {
                let candidates: Vec<WorkerId> = self
                    .workers
                    .iter()
                    .rev()
                    .filter(|w| w.status == WorkerStatus::Idle)
                    .take(n)
                    .map(|w| w.id.clone())
                    .collect();
                let mut removed = 0usize;
                for id in candidates {
                    match self.remove_worker(&id) {
                        Ok(_) => removed += 1,
                        Err(e) => warn!(worker_id = %id, error = %e, "skipping worker during scale down"),
                    }
                }
                if removed > 0 {
                    info!(removed, total = self.len(), "scaled worker pool down");
                }
                -removed.cast_signed()
            }
            ScaleDecision::Hold => 0,
        }
    }
}
