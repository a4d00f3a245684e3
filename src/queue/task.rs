use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of scheduler-triggered tasks; ranks above manual triggers.
pub const SCHEDULED_PRIORITY: u8 = 10;
/// Priority of manually triggered tasks.
pub const MANUAL_PRIORITY: u8 = 1;

/// A queued unit of work wrapping one import run's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTask {
    pub run_id: Uuid,
    /// Target feed; `None` means all configured feeds.
    pub feed_url: Option<String>,
}

/// Options accepted at enqueue time.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Higher runs first among ready tasks.
    pub priority: u8,
    pub delay: Option<Duration>,
    /// Rejects the enqueue while another task with the same id is queued.
    pub dedupe_id: Option<String>,
}

/// Final record of a task, kept in bounded history.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub task_id: u64,
    pub task: ImportTask,
    pub attempts_made: u32,
    pub finished_at: DateTime<Utc>,
    /// Last error for dead tasks; `None` for completed ones.
    pub error: Option<String>,
}

/// Point-in-time queue counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
