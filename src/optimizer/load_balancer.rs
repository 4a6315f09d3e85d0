//! Per-agent load tracking with lease-based accounting and agent selection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::SchedulerError;

/// Rule used to pick an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum BalancingStrategy {
    /// Cycle through agents in name order.
    RoundRobin,
    /// Lowest tracked load.
    #[default]
    LeastLoaded,
    /// Random, proportional to weight.
    WeightedRandom,
    /// Uniformly random.
    Random,
}

impl BalancingStrategy {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::LeastLoaded => "least-loaded",
            Self::WeightedRandom => "weighted-random",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for BalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalancingStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Self::RoundRobin),
            "least-loaded" => Ok(Self::LeastLoaded),
            "weighted-random" => Ok(Self::WeightedRandom),
            "random" => Ok(Self::Random),
            other => Err(SchedulerError::UnknownStrategy(other.to_string())),
        }
    }
}

impl TryFrom<String> for BalancingStrategy {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Load and weight of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLoad {
    /// Outstanding leases.
    pub load: usize,
    /// Relative weight for weighted-random selection.
    pub weight: u32,
}

impl Default for AgentLoad {
    fn default() -> Self {
        Self { load: 0, weight: 1 }
    }
}

type LoadTable = Arc<RwLock<BTreeMap<String, AgentLoad>>>;

/// Tracks in-flight work per agent.
///
/// Load only changes through [`LoadLease`]s, so every increment is paired
/// with exactly one decrement even when the holder panics or is cancelled.
#[derive(Clone)]
pub struct LoadBalancer {
    agents: LoadTable,
    strategy: Arc<RwLock<BalancingStrategy>>,
    rr_counter: Arc<AtomicUsize>,
}

impl LoadBalancer {
    /// Create an empty balancer.
    #[must_use]
    pub fn new(strategy: BalancingStrategy) -> Self {
        Self {
            agents: Arc::new(RwLock::new(BTreeMap::new())),
            strategy: Arc::new(RwLock::new(strategy)),
            rr_counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Active strategy.
    #[must_use]
    pub fn strategy(&self) -> BalancingStrategy {
        *self.strategy.read()
    }

    /// Switch strategy at runtime.
    pub fn set_strategy(&self, strategy: BalancingStrategy) {
        *self.strategy.write() = strategy;
    }

    /// Register an agent or update its weight.
    pub fn register(&self, agent: impl Into<String>, weight: u32) {
        let mut agents = self.agents.write();
        agents.entry(agent.into()).or_default().weight = weight;
    }

    /// Forget an agent. Outstanding leases still release cleanly.
    pub fn deregister(&self, agent: &str) -> Option<AgentLoad> {
        self.agents.write().remove(agent)
    }

    /// Count one unit of work against `agent` until the lease is released.
    ///
    /// Unknown agents are registered with weight 1.
    #[must_use = "dropping the lease releases the load immediately"]
    pub fn acquire(&self, agent: &str) -> LoadLease {
        {
            let mut agents = self.agents.write();
            let entry = agents.entry(agent.to_string()).or_default();
            entry.load += 1;
            trace!(agent, load = entry.load, "load lease acquired");
        }
        LoadLease {
            agents: Arc::clone(&self.agents),
            agent: agent.to_string(),
            released: false,
        }
    }

    /// Current load of `agent`.
    #[must_use]
    pub fn load(&self, agent: &str) -> usize {
        self.agents.read().get(agent).map_or(0, |a| a.load)
    }

    /// Total load across agents.
    #[must_use]
    pub fn total_load(&self) -> usize {
        self.agents.read().values().map(|a| a.load).sum()
    }

    /// Load and weight of every agent, in name order.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, AgentLoad> {
        self.agents.read().clone()
    }

    /// Pick an agent according to the active strategy.
    #[must_use]
    pub fn select(&self) -> Option<String> {
        let agents = self.agents.read();
        if agents.is_empty() {
            return None;
        }
        let names: Vec<&String> = agents.keys().collect();

        let chosen = match self.strategy() {
            BalancingStrategy::RoundRobin => {
                let n = self.rr_counter.fetch_add(1, Ordering::Relaxed);
                names[n % names.len()]
            }
            BalancingStrategy::LeastLoaded => agents
                .iter()
                .min_by_key(|(_, a)| a.load)
                .map(|(name, _)| name)?,
            BalancingStrategy::WeightedRandom => {
                let total: u64 = agents.values().map(|a| u64::from(a.weight)).sum();
                if total == 0 {
                    names[rand::rng().random_range(0..names.len())]
                } else {
                    let mut pick = rand::rng().random_range(0..total);
                    let mut chosen = names[0];
                    for (name, a) in agents.iter() {
                        let w = u64::from(a.weight);
                        if pick < w {
                            chosen = name;
                            break;
                        }
                        pick -= w;
                    }
                    chosen
                }
            }
            BalancingStrategy::Random => names[rand::rng().random_range(0..names.len())],
        };
        Some(chosen.clone())
    }
}

/// One unit of load on an agent, released on drop.
pub struct LoadLease {
    agents: LoadTable,
    agent: String,
    released: bool,
}

impl LoadLease {
    /// Agent this lease counts against.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Release now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(entry) = self.agents.write().get_mut(&self.agent) {
            entry.load = entry.load.saturating_sub(1);
            trace!(agent = %self.agent, load = entry.load, "load lease released");
        }
    }
}

impl Drop for LoadLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LoadLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadLease")
            .field("agent", &self.agent)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_release_is_symmetric() {
        let lb = LoadBalancer::new(BalancingStrategy::LeastLoaded);
        let a = lb.acquire("codegen");
        let b = lb.acquire("codegen");
        assert_eq!(lb.load("codegen"), 2);

        a.release();
        assert_eq!(lb.load("codegen"), 1);
        drop(b);
        assert_eq!(lb.load("codegen"), 0);
    }

    #[test]
    fn test_least_loaded_selection() {
        let lb = LoadBalancer::new(BalancingStrategy::LeastLoaded);
        lb.register("codegen", 1);
        lb.register("review", 1);
        let _busy = lb.acquire("codegen");
        assert_eq!(lb.select().as_deref(), Some("review"));
    }

    #[test]
    fn test_round_robin_cycles_in_name_order() {
        let lb = LoadBalancer::new(BalancingStrategy::RoundRobin);
        lb.register("b", 1);
        lb.register("a", 1);
        let picks: Vec<_> = (0..3).filter_map(|_| lb.select()).collect();
        assert_eq!(picks, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_weighted_random_skips_zero_weight() {
        let lb = LoadBalancer::new(BalancingStrategy::WeightedRandom);
        lb.register("never", 0);
        lb.register("always", 5);
        for _ in 0..50 {
            assert_eq!(lb.select().as_deref(), Some("always"));
        }
    }

    #[test]
    fn test_deregistered_lease_drop_is_harmless() {
        let lb = LoadBalancer::new(BalancingStrategy::Random);
        let lease = lb.acquire("temp");
        assert!(lb.deregister("temp").is_some());
        drop(lease);
        assert!(lb.select().is_none());
        assert!("fastest".parse::<BalancingStrategy>().is_err());
    }
}
