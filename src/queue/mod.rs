//! Durable task queue and bounded-concurrency worker pool.

mod dispatcher;
mod task;

pub use dispatcher::{DispatcherConfig, WorkDispatcher};
pub use task::{
    EnqueueOptions, ImportTask, MANUAL_PRIORITY, QueueStats, SCHEDULED_PRIORITY, TaskRecord,
};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppResult;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task with dedupe id '{0}' is already queued")]
    DuplicateTask(String),

    #[error("queue is shutting down")]
    ShuttingDown,
}

/// Executes the body of one queued task.
///
/// Execution is at-least-once: an error return makes the dispatcher re-queue
/// the task with backoff until the attempt cap, so handlers must be
/// idempotent at the item level.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &ImportTask) -> AppResult<()>;
}
