//! Batch application of extracted records against the store, with a
//! run-level wall-clock budget and exactly-once run finalization.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{JobRecord, RunCounters, RunError, RunStatus};
use crate::store::{JobStore, RunCompletion, RunStore, UpsertOutcome};

/// Aggregated outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub total_fetched: u64,
    pub total_imported: u64,
    pub new_jobs: u64,
    pub updated_jobs: u64,
    pub failed_jobs: u64,
    pub errors: Vec<RunError>,
}

impl ImportResult {
    fn counters(&self) -> RunCounters {
        RunCounters {
            total_fetched: self.total_fetched,
            total_imported: self.total_imported,
            new_jobs: self.new_jobs,
            updated_jobs: self.updated_jobs,
            failed_jobs: self.failed_jobs,
        }
    }
}

/// Applies record batches to the store and finalizes their run.
///
/// The per-record loop is strictly sequential; the only concurrency
/// safeguard it relies on is the store's atomic upsert.
#[derive(Clone)]
pub struct ImportCoordinator {
    jobs: Arc<dyn JobStore>,
    runs: Arc<dyn RunStore>,
    run_budget: Duration,
}

impl ImportCoordinator {
    pub fn new(jobs: Arc<dyn JobStore>, runs: Arc<dyn RunStore>, run_budget: Duration) -> Self {
        Self {
            jobs,
            runs,
            run_budget,
        }
    }

    /// The deadline for a run starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.run_budget
    }

    /// Imports one batch under a fresh deadline and finalizes the run.
    ///
    /// On a run-level timeout the run is finalized as failed and the error
    /// is re-raised so the dispatcher can retry the task. Records already
    /// applied stay applied.
    pub async fn import_batch(
        &self,
        records: Vec<JobRecord>,
        source_feed: &str,
        run_id: Uuid,
    ) -> AppResult<ImportResult> {
        let deadline = self.deadline();
        let mut result = ImportResult::default();
        match self
            .apply_records(&mut result, records, source_feed, deadline)
            .await
        {
            Ok(()) => {
                self.finalize(run_id, &mut result).await?;
                Ok(result)
            }
            Err(error) => {
                self.abort(run_id, &mut result, error.to_string()).await?;
                Err(error)
            }
        }
    }

    /// Applies one feed's records into an accumulating result.
    ///
    /// The deadline is checked before each record; crossing it raises
    /// `RunTimeout` and leaves the remaining records unprocessed. A single
    /// record's store failure is contained: counted, recorded with the
    /// record's external id, and the loop continues.
    pub async fn apply_records(
        &self,
        result: &mut ImportResult,
        records: Vec<JobRecord>,
        source_feed: &str,
        deadline: Instant,
    ) -> AppResult<()> {
        result.total_fetched += records.len() as u64;

        for mut record in records {
            if Instant::now() >= deadline {
                return Err(AppError::RunTimeout {
                    budget_secs: self.run_budget.as_secs(),
                });
            }

            record.source_feed = source_feed.to_string();
            let external_id = record.external_id.clone();
            match self.jobs.upsert(record).await {
                Ok(UpsertOutcome::Created) => {
                    result.new_jobs += 1;
                    tracing::debug!(external_id = %external_id, "created job record");
                }
                Ok(UpsertOutcome::Updated) => {
                    result.updated_jobs += 1;
                    tracing::debug!(external_id = %external_id, "updated job record");
                }
                Err(error) => {
                    result.failed_jobs += 1;
                    result
                        .errors
                        .push(RunError::item(&external_id, error.to_string()));
                    tracing::error!(external_id = %external_id, %error, "failed to apply job record");
                }
            }
        }

        Ok(())
    }

    /// Finalizes the run exactly once.
    ///
    /// Status is `Failed` iff every fetched record failed (an empty batch
    /// counts as all-failed), else `Completed`; the run tolerates partial
    /// failure. The transition is conditional, so a reconciler force-fail
    /// that already landed wins and this becomes a no-op.
    pub async fn finalize(&self, run_id: Uuid, result: &mut ImportResult) -> AppResult<()> {
        result.total_imported = result.new_jobs + result.updated_jobs;
        let status = if result.failed_jobs == result.total_fetched {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let applied = self
            .runs
            .finalize_if_running(
                run_id,
                RunCompletion {
                    status,
                    counters: Some(result.counters()),
                    errors: result.errors.clone(),
                    end_time: Utc::now(),
                },
            )
            .await?;
        if !applied {
            tracing::warn!(run_id = %run_id, "run already terminal at finalize; result discarded");
            return Ok(());
        }

        tracing::info!(
            run_id = %run_id,
            status = %status,
            total_fetched = result.total_fetched,
            new_jobs = result.new_jobs,
            updated_jobs = result.updated_jobs,
            failed_jobs = result.failed_jobs,
            "import run finalized"
        );
        Ok(())
    }

    /// Marks the run failed after an aborting error, appending the
    /// accumulated item errors plus one run-level entry.
    pub async fn abort(
        &self,
        run_id: Uuid,
        result: &mut ImportResult,
        message: String,
    ) -> AppResult<()> {
        result.total_imported = result.new_jobs + result.updated_jobs;
        let mut errors = result.errors.clone();
        errors.push(RunError::run_level(message));

        let applied = self
            .runs
            .finalize_if_running(
                run_id,
                RunCompletion {
                    status: RunStatus::Failed,
                    counters: Some(result.counters()),
                    errors,
                    end_time: Utc::now(),
                },
            )
            .await?;
        if applied {
            tracing::error!(run_id = %run_id, "import run aborted");
        }
        Ok(())
    }
}
