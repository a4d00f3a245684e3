//! The task body: wires the fetcher and coordinator into one run execution.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::fetch::FeedFetcher;
use crate::import::{ImportCoordinator, ImportResult};
use crate::queue::{ImportTask, TaskHandler};

/// Executes one import run: a single feed, or all configured feeds
/// sequentially under one shared deadline.
pub struct ImportRunner {
    fetcher: FeedFetcher,
    coordinator: ImportCoordinator,
    feed_urls: Vec<String>,
}

impl ImportRunner {
    pub fn new(
        fetcher: FeedFetcher,
        coordinator: ImportCoordinator,
        feed_urls: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            coordinator,
            feed_urls,
        }
    }

    /// Runs one import to completion and returns its result.
    ///
    /// Errors propagate to the dispatcher, which retries the task with
    /// backoff; a fetch failure before any store work leaves the run in
    /// `Running` for the reconciler to pick up if every retry is spent.
    pub async fn run_import(
        &self,
        run_id: Uuid,
        feed_url: Option<&str>,
    ) -> AppResult<ImportResult> {
        match feed_url {
            Some(feed_url) => {
                let records = self.fetcher.fetch_feed(feed_url).await?;
                self.coordinator.import_batch(records, feed_url, run_id).await
            }
            None => self.import_all(run_id).await,
        }
    }

    /// Full-refresh run: every configured feed, one accumulated result,
    /// finalized once. Feeds that fail to fetch were already excluded by
    /// `fetch_all`; the records of surviving feeds are applied strictly
    /// sequentially, so there is no duplicate-key race within the run.
    async fn import_all(&self, run_id: Uuid) -> AppResult<ImportResult> {
        let deadline = self.coordinator.deadline();
        let feeds = self.fetcher.fetch_all(&self.feed_urls).await;

        let mut result = ImportResult::default();
        for (feed_url, records) in feeds {
            if let Err(error) = self
                .coordinator
                .apply_records(&mut result, records, &feed_url, deadline)
                .await
            {
                self.coordinator
                    .abort(run_id, &mut result, error.to_string())
                    .await?;
                return Err(error);
            }
        }

        self.coordinator.finalize(run_id, &mut result).await?;
        Ok(result)
    }
}

#[async_trait]
impl TaskHandler for ImportRunner {
    async fn handle(&self, task: &ImportTask) -> AppResult<()> {
        self.run_import(task.run_id, task.feed_url.as_deref())
            .await
            .map(|_| ())
    }
}
