//! Detection and force-failure of stalled import runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::models::{RunError, RunStatus};
use crate::store::{RunCompletion, RunStore};

/// Periodically force-fails runs stuck in `Running` past a timeout window.
///
/// A task can die without finalizing its run (process crash, dead-lettered
/// retries); this sweep is what moves such runs to a terminal state. It is
/// also invoked inline before run-history reads so callers never see stale
/// `Running` rows.
pub struct StalledRunReconciler {
    runs: Arc<dyn RunStore>,
    stalled_after: Duration,
}

impl StalledRunReconciler {
    pub fn new(runs: Arc<dyn RunStore>, stalled_after: Duration) -> Self {
        Self { runs, stalled_after }
    }

    /// Force-fails every stalled run, appending a synthetic timeout error.
    /// Idempotent: terminal runs are untouched, and the conditional
    /// transition loses gracefully against a concurrent finalize.
    pub async fn sweep(&self) -> AppResult<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stalled_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(120));
        let stalled = self.runs.find_stalled(cutoff).await?;

        let mut failed = 0usize;
        for run in stalled {
            tracing::warn!(
                run_id = %run.id,
                label = %run.label,
                started = %run.start_time,
                "import run stalled, forcing failed"
            );
            let applied = self
                .runs
                .finalize_if_running(
                    run.id,
                    RunCompletion {
                        status: RunStatus::Failed,
                        counters: None,
                        errors: vec![RunError::run_level(format!(
                            "Import timed out after {} seconds in running state",
                            self.stalled_after.as_secs()
                        ))],
                        end_time: Utc::now(),
                    },
                )
                .await?;
            if applied {
                failed += 1;
            }
        }

        if failed > 0 {
            tracing::info!(failed, "stalled run sweep finished");
        }
        Ok(failed)
    }

    /// Spawns the fixed-interval sweep loop.
    pub fn spawn(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(error) = reconciler.sweep().await {
                    tracing::error!(%error, "stalled run sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    use crate::models::ImportRun;
    use crate::store::MemoryRunStore;

    fn reconciler(runs: Arc<MemoryRunStore>) -> StalledRunReconciler {
        StalledRunReconciler::new(runs, Duration::from_secs(120))
    }

    fn backdated_run(label: &str, minutes: i64) -> ImportRun {
        let mut run = ImportRun::new(label);
        run.start_time = Utc::now() - ChronoDuration::minutes(minutes);
        run
    }

    #[tokio::test]
    async fn sweep_fails_old_running_runs_and_appends_error() {
        let runs = Arc::new(MemoryRunStore::new());
        let mut stalled = backdated_run("feed-a", 5);
        stalled.errors.push(RunError::item("j1", "store refused"));
        runs.insert(stalled.clone());

        let swept = reconciler(runs.clone()).sweep().await.unwrap();
        assert_eq!(swept, 1);

        let stored = runs.get(stalled.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert!(stored.end_time.is_some());
        // Pre-existing entries preserved, one synthetic entry appended.
        assert_eq!(stored.errors.len(), 2);
        assert_eq!(stored.errors[0].job_id.as_deref(), Some("j1"));
        assert!(stored.errors[1].message.contains("timed out"));
    }

    #[tokio::test]
    async fn sweep_ignores_fresh_and_terminal_runs() {
        let runs = Arc::new(MemoryRunStore::new());
        let fresh = runs.create("feed-fresh").await.unwrap();

        let mut done = backdated_run("feed-done", 10);
        done.status = RunStatus::Completed;
        runs.insert(done.clone());

        let swept = reconciler(runs.clone()).sweep().await.unwrap();
        assert_eq!(swept, 0);
        assert_eq!(
            runs.get(fresh.id).await.unwrap().unwrap().status,
            RunStatus::Running
        );
        assert_eq!(
            runs.get(done.id).await.unwrap().unwrap().status,
            RunStatus::Completed
        );
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let runs = Arc::new(MemoryRunStore::new());
        let stalled = backdated_run("feed-a", 5);
        runs.insert(stalled.clone());
        let reconciler = reconciler(runs.clone());

        assert_eq!(reconciler.sweep().await.unwrap(), 1);
        assert_eq!(reconciler.sweep().await.unwrap(), 0);

        // Still exactly one synthetic error entry.
        let stored = runs.get(stalled.id).await.unwrap().unwrap();
        assert_eq!(stored.errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_loop_sweeps_until_cancelled() {
        let runs = Arc::new(MemoryRunStore::new());
        runs.insert(backdated_run("feed-a", 5));
        let reconciler = Arc::new(StalledRunReconciler::new(
            runs.clone(),
            Duration::from_secs(120),
        ));

        let cancel = CancellationToken::new();
        let handle = reconciler.spawn(Duration::from_secs(60), cancel.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        let stored = runs.list(&Default::default()).await.unwrap();
        assert_eq!(stored[0].status, RunStatus::Failed);

        cancel.cancel();
        handle.await.unwrap();
    }
}
