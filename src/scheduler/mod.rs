//! Periodic scheduling of full-refresh import runs.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::queue::{EnqueueOptions, ImportTask, SCHEDULED_PRIORITY, WorkDispatcher};
use crate::store::RunStore;

/// Label of runs created by the scheduler.
pub const SCHEDULED_RUN_LABEL: &str = "scheduled-import";

/// Wrapper around tokio-cron-scheduler firing full-refresh imports.
pub struct ImportScheduler {
    scheduler: JobScheduler,
}

impl ImportScheduler {
    /// Registers the cron job and starts the scheduler.
    pub async fn start(
        config: &SchedulerConfig,
        runs: Arc<dyn RunStore>,
        dispatcher: Arc<WorkDispatcher>,
    ) -> AppResult<Self> {
        let scheduler = JobScheduler::new().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        let timezone = chrono_tz::Tz::from_str(&config.timezone).map_err(|e| {
            AppError::Internal {
                source: anyhow::anyhow!("invalid scheduler timezone '{}': {e}", config.timezone),
            }
        })?;

        let job = Job::new_async_tz(config.cron.as_str(), timezone, move |_uuid, _lock| {
            let runs = Arc::clone(&runs);
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move {
                if let Err(error) = scheduled_tick(runs.as_ref(), &dispatcher, Utc::now()).await {
                    tracing::error!(%error, "scheduled import tick failed");
                }
            })
        })
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        scheduler.add(job).await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;
        scheduler.start().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!(cron = %config.cron, timezone = %config.timezone, "cron scheduler started");
        Ok(Self { scheduler })
    }

    /// Stops the scheduler gracefully. Already-enqueued tasks are untouched.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })
    }
}

/// One scheduler tick: create a run and enqueue a full-feed task.
///
/// The dedupe id is derived from the tick timestamp, so a single tick cannot
/// double-enqueue; the task ranks above manual triggers.
pub async fn scheduled_tick(
    runs: &dyn RunStore,
    dispatcher: &WorkDispatcher,
    now: DateTime<Utc>,
) -> AppResult<(Uuid, u64)> {
    tracing::info!("starting scheduled import");

    let run = runs.create(SCHEDULED_RUN_LABEL).await?;
    let task_id = dispatcher.enqueue(
        ImportTask {
            run_id: run.id,
            feed_url: None,
        },
        EnqueueOptions {
            priority: SCHEDULED_PRIORITY,
            delay: None,
            dedupe_id: Some(format!("scheduled-{}", now.timestamp_millis())),
        },
    )?;

    tracing::info!(run_id = %run.id, task_id, "scheduled import queued");
    Ok((run.id, task_id))
}
