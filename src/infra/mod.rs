//! Infrastructure adapters for queues and result storage.

pub mod queue;
pub mod results;

pub use queue::InMemoryQueue;
pub use results::InMemoryResultStore;
