//! Import triggering and run-history/queue introspection.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ImportRun;
use crate::queue::{EnqueueOptions, ImportTask, MANUAL_PRIORITY, QueueStats, WorkDispatcher};
use crate::reconcile::StalledRunReconciler;
use crate::store::{RunFilter, RunStore};

/// Label of manually triggered full-refresh runs.
pub const ALL_FEEDS_LABEL: &str = "all-feeds";

#[derive(Debug, Clone, Serialize)]
pub struct TriggeredImport {
    pub run_id: Uuid,
    pub task_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunHistoryPage {
    pub runs: Vec<ImportRun>,
    pub total: u64,
}

/// Entry points for callers outside the pipeline (CLI, future HTTP layer).
#[derive(Clone)]
pub struct ImportService {
    runs: Arc<dyn RunStore>,
    dispatcher: Arc<WorkDispatcher>,
    reconciler: Arc<StalledRunReconciler>,
}

impl ImportService {
    pub fn new(
        runs: Arc<dyn RunStore>,
        dispatcher: Arc<WorkDispatcher>,
        reconciler: Arc<StalledRunReconciler>,
    ) -> Self {
        Self {
            runs,
            dispatcher,
            reconciler,
        }
    }

    /// Creates a run and enqueues its task at manual priority.
    pub async fn trigger_import(&self, feed_url: Option<String>) -> AppResult<TriggeredImport> {
        let label = feed_url.as_deref().unwrap_or(ALL_FEEDS_LABEL);
        let run = self.runs.create(label).await?;
        let task_id = self.dispatcher.enqueue(
            ImportTask {
                run_id: run.id,
                feed_url: feed_url.clone(),
            },
            EnqueueOptions {
                priority: MANUAL_PRIORITY,
                ..EnqueueOptions::default()
            },
        )?;

        tracing::info!(run_id = %run.id, task_id, label, "import queued");
        Ok(TriggeredImport {
            run_id: run.id,
            task_id,
        })
    }

    /// Run-history page, newest first. Sweeps stalled runs first so the
    /// page never shows a stale `Running` row.
    pub async fn import_history(&self, filter: RunFilter) -> AppResult<RunHistoryPage> {
        self.reconciler.sweep().await?;
        let total = self.runs.count(&filter).await?;
        let runs = self.runs.list(&filter).await?;
        Ok(RunHistoryPage { runs, total })
    }

    pub async fn get_run(&self, id: Uuid) -> AppResult<Option<ImportRun>> {
        Ok(self.runs.get(id).await?)
    }

    /// Queue counts, after a stalled-run sweep.
    pub async fn queue_status(&self) -> AppResult<QueueStats> {
        self.reconciler.sweep().await?;
        Ok(self.dispatcher.stats())
    }
}
