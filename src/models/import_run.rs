use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an import run.
///
/// `Running` is the only non-terminal state; a run transitions exactly once
/// to `Completed` or `Failed` and never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counters accumulated over one ingestion attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub total_fetched: u64,
    pub total_imported: u64,
    pub new_jobs: u64,
    pub updated_jobs: u64,
    pub failed_jobs: u64,
}

/// One entry in a run's error log.
///
/// The log is append-only: finalization, aborts, and the stalled-run
/// reconciler all add entries, none of them truncate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    /// External id of the failed record, when the error is item-level.
    pub job_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RunError {
    pub fn item(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn run_level(message: impl Into<String>) -> Self {
        Self {
            job_id: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One ingestion attempt's record of scope, status, counters, and errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: Uuid,
    /// A feed URL, `"all-feeds"`, or `"scheduled-import"`.
    pub label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub counters: RunCounters,
    pub errors: Vec<RunError>,
    pub processing_time_ms: Option<i64>,
}

impl ImportRun {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            counters: RunCounters::default(),
            errors: Vec::new(),
            processing_time_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_running_with_zero_counters() {
        let run = ImportRun::new("all-feeds");
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.counters, RunCounters::default());
        assert!(run.end_time.is_none());
        assert!(run.errors.is_empty());
    }

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
