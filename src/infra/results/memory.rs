//! In-memory store of terminal execution results.

use std::collections::HashMap;

use crate::core::{ExecutionResult, ExecutionStatus, TaskId};

/// Keeps the latest terminal [`ExecutionResult`] per task.
///
/// A later outcome for the same task replaces the earlier one; entries are
/// never pruned for the lifetime of the scheduler.
pub struct InMemoryResultStore<R> {
    results: HashMap<TaskId, ExecutionResult<R>>,
    order: Vec<TaskId>,
}

impl<R> Default for InMemoryResultStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> InMemoryResultStore<R> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Record a terminal outcome, replacing any previous one for the task.
    pub fn record(&mut self, result: ExecutionResult<R>) {
        if !self.results.contains_key(&result.task_id) {
            self.order.push(result.task_id.clone());
        }
        self.results.insert(result.task_id.clone(), result);
    }

    /// Outcome for a task.
    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<&ExecutionResult<R>> {
        self.results.get(task_id)
    }

    /// All outcomes in the order tasks first reached a terminal state.
    pub fn list(&self) -> Vec<ExecutionResult<R>>
    where
        R: Clone,
    {
        self.order
            .iter()
            .filter_map(|id| self.results.get(id))
            .cloned()
            .collect()
    }

    /// Number of outcomes with `status`.
    #[must_use]
    pub fn count_with(&self, status: ExecutionStatus) -> usize {
        self.results.values().filter(|r| r.status == status).count()
    }

    /// Number of tasks with a recorded outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
