//! In-memory priority queue with FIFO ordering inside a priority.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::core::{SchedulerError, Task, TaskId};

/// Ordering key: lower priority value first, then lower sequence first.
///
/// Fresh submissions take increasing sequence numbers; retries take
/// decreasing negative ones so they land ahead of their priority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    priority: u32,
    seq: i64,
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// In-memory queue storing pending tasks in dispatch order.
pub struct InMemoryQueue<P> {
    max_depth: usize,
    tasks: BTreeMap<QueueKey, Task<P>>,
    next_seq: i64,
    next_front_seq: i64,
}

impl<P> InMemoryQueue<P> {
    /// Create a new in-memory queue with a maximum depth.
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            tasks: BTreeMap::new(),
            next_seq: 0,
            next_front_seq: -1,
        }
    }

    /// Enqueue a task if space permits.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::QueueFull` at `max_depth`.
    pub fn enqueue(&mut self, task: Task<P>) -> Result<(), SchedulerError> {
        if self.tasks.len() >= self.max_depth {
            return Err(SchedulerError::QueueFull(format!(
                "max queue depth {} reached",
                self.max_depth
            )));
        }
        let key = QueueKey {
            priority: task.priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.tasks.insert(key, task);
        Ok(())
    }

    /// Put a retried task ahead of every queued task with the same priority.
    ///
    /// Skips the depth check: the task was admitted on its first submission.
    pub fn requeue_front(&mut self, task: Task<P>) {
        let key = QueueKey {
            priority: task.priority,
            seq: self.next_front_seq,
        };
        self.next_front_seq -= 1;
        self.tasks.insert(key, task);
    }

    /// Head of the queue.
    #[must_use]
    pub fn peek(&self) -> Option<&Task<P>> {
        self.tasks.values().next()
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<Task<P>> {
        self.tasks.pop_first().map(|(_, task)| task)
    }

    /// Remove and return the first task, in queue order, matching `pred`.
    pub fn take_first<F>(&mut self, mut pred: F) -> Option<Task<P>>
    where
        F: FnMut(&Task<P>) -> bool,
    {
        let key = self
            .tasks
            .iter()
            .find(|(_, task)| pred(task))
            .map(|(key, _)| *key)?;
        self.tasks.remove(&key)
    }

    /// Remove every task matching `pred` and return them in queue order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<Task<P>>
    where
        F: FnMut(&Task<P>) -> bool,
    {
        let keys: Vec<QueueKey> = self
            .tasks
            .iter()
            .filter(|(_, task)| pred(task))
            .map(|(key, _)| *key)
            .collect();
        keys.iter().filter_map(|k| self.tasks.remove(k)).collect()
    }

    /// Whether a task id is queued.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.values().any(|t| &t.id == id)
    }

    /// Tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task<P>> {
        self.tasks.values()
    }

    /// Maximum depth allowed for fresh submissions.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, priority: u32) -> Task<String> {
        Task::with_id(id, "feature", priority, format!("task-{id}"))
    }

    fn drain_ids(q: &mut InMemoryQueue<String>) -> Vec<String> {
        std::iter::from_fn(|| q.dequeue()).map(|t| t.id).collect()
    }

    #[test]
    fn test_priority_ordering() {
        let mut q = InMemoryQueue::new(100);
        q.enqueue(make_task("a", 5)).unwrap();
        q.enqueue(make_task("b", 1)).unwrap();
        q.enqueue(make_task("c", 3)).unwrap();

        assert_eq!(drain_ids(&mut q), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut q = InMemoryQueue::new(100);
        q.enqueue(make_task("1", 2)).unwrap();
        q.enqueue(make_task("2", 2)).unwrap();
        q.enqueue(make_task("3", 2)).unwrap();

        assert_eq!(drain_ids(&mut q), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_requeue_front_stays_inside_priority_band() {
        let mut q = InMemoryQueue::new(100);
        q.enqueue(make_task("urgent", 1)).unwrap();
        q.enqueue(make_task("normal", 3)).unwrap();
        q.requeue_front(make_task("retried", 3));

        assert_eq!(drain_ids(&mut q), vec!["urgent", "retried", "normal"]);
    }

    #[test]
    fn test_queue_full() {
        let mut q = InMemoryQueue::new(2);
        q.enqueue(make_task("1", 1)).unwrap();
        q.enqueue(make_task("2", 1)).unwrap();

        let result = q.enqueue(make_task("3", 1));
        assert!(matches!(result, Err(SchedulerError::QueueFull(_))));

        q.requeue_front(make_task("4", 1));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_take_first_and_remove_where() {
        let mut q = InMemoryQueue::new(10);
        q.enqueue(make_task("a", 1)).unwrap();
        q.enqueue(make_task("b", 2)).unwrap();
        q.enqueue(make_task("c", 3)).unwrap();

        let taken = q.take_first(|t| t.priority > 1).unwrap();
        assert_eq!(taken.id, "b");

        let removed = q.remove_where(|t| t.id == "c");
        assert_eq!(removed.len(), 1);
        assert_eq!(q.peek().map(|t| t.id.as_str()), Some("a"));
        assert!(q.contains(&"a".to_string()));
    }

    #[test]
    fn test_empty_queue() {
        let mut q = InMemoryQueue::<String>::new(100);
        assert!(q.dequeue().is_none());
        assert!(q.is_empty());
    }
}
