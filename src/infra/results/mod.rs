//! Terminal outcome stores.

pub mod memory;

pub use memory::InMemoryResultStore;
