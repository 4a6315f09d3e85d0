//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    diagnostics, health, submit_tasks, task_status, DiagnosticsSnapshot, Health, QueuedTaskView,
    TaskStatusResponse, TaskSubmission,
};
pub use tokio_spawner::TokioSpawner;
