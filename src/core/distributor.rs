//! Worker selection strategies.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, Worker, WorkerId};

/// Rule used to pick a worker for a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum DistributionStrategy {
    /// Cycle through eligible workers.
    RoundRobin,
    /// Lowest current load.
    #[default]
    LeastLoaded,
    /// Match task type to skills, falling back to least-loaded.
    SkillBased,
    /// Highest priority weight.
    PriorityBased,
}

impl DistributionStrategy {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::LeastLoaded => "least-loaded",
            Self::SkillBased => "skill-based",
            Self::PriorityBased => "priority-based",
        }
    }
}

impl fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Self::RoundRobin),
            "least-loaded" => Ok(Self::LeastLoaded),
            "skill-based" => Ok(Self::SkillBased),
            "priority-based" => Ok(Self::PriorityBased),
            other => Err(SchedulerError::UnknownStrategy(other.to_string())),
        }
    }
}

impl TryFrom<String> for DistributionStrategy {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Picks one eligible worker per task.
#[derive(Debug)]
pub struct TaskDistributor {
    strategy: RwLock<DistributionStrategy>,
    skill_map: HashMap<String, Vec<String>>,
    rr_counter: AtomicUsize,
}

impl TaskDistributor {
    /// Create a distributor with a task-type → required-skills map.
    #[must_use]
    pub fn new(strategy: DistributionStrategy, skill_map: HashMap<String, Vec<String>>) -> Self {
        Self {
            strategy: RwLock::new(strategy),
            skill_map,
            rr_counter: AtomicUsize::new(0),
        }
    }

    /// Active strategy.
    #[must_use]
    pub fn strategy(&self) -> DistributionStrategy {
        *self.strategy.read()
    }

    /// Switch strategy at runtime.
    pub fn set_strategy(&self, strategy: DistributionStrategy) {
        *self.strategy.write() = strategy;
    }

    /// Skills a task type needs; empty when unmapped.
    #[must_use]
    pub fn required_skills(&self, task_type: &str) -> &[String] {
        match self.skill_map.get(task_type) {
            Some(skills) => skills.as_slice(),
            None => &[],
        }
    }

    /// Pick a worker for a task of `task_type`, or `None` when nothing is eligible.
    #[must_use]
    pub fn select(&self, task_type: &str, workers: &[Worker]) -> Option<WorkerId> {
        let eligible: Vec<&Worker> = workers.iter().filter(|w| w.is_eligible()).collect();
        if eligible.is_empty() {
            return None;
        }

        let chosen = match self.strategy() {
            DistributionStrategy::RoundRobin => {
                let n = self.rr_counter.fetch_add(1, Ordering::Relaxed);
                eligible[n % eligible.len()]
            }
            DistributionStrategy::LeastLoaded => least_loaded(&eligible)?,
            DistributionStrategy::SkillBased => {
                let required = self.required_skills(task_type);
                let matching: Vec<&Worker> = eligible
                    .iter()
                    .copied()
                    .filter(|w| w.has_any_skill(required))
                    .collect();
                if matching.is_empty() {
                    least_loaded(&eligible)?
                } else {
                    least_loaded(&matching)?
                }
            }
            DistributionStrategy::PriorityBased => eligible
                .iter()
                .copied()
                .reduce(|best, w| if w.priority_weight > best.priority_weight { w } else { best })?,
        };
        Some(chosen.id.clone())
    }
}

/// First worker with the minimum load; ties resolve to pool order.
fn least_loaded<'a>(workers: &[&'a Worker]) -> Option<&'a Worker> {
    workers
        .iter()
        .copied()
        .reduce(|best, w| if w.current_load < best.current_load { w } else { best })
}
