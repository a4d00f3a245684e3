//! In-process reference implementation of the store contracts.
//!
//! Backed by sharded concurrent maps; the upsert and the conditional run
//! transition hold the entry lock for the whole mutation, so they are atomic
//! with respect to concurrent tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::models::{ImportRun, JobKey, JobRecord};
use crate::store::{JobStore, RunCompletion, RunFilter, RunStore, StoreError, UpsertOutcome};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobKey, JobRecord>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert(&self, record: JobRecord) -> Result<UpsertOutcome, StoreError> {
        match self.jobs.entry(record.key()) {
            Entry::Occupied(mut existing) => {
                existing.insert(record);
                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn find_by_key(&self, key: &JobKey) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.get(key).map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.jobs.len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: DashMap<Uuid, ImportRun>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pre-built run, preserving its id and start time. Lets tests
    /// and recovery paths seed runs that `create` would timestamp itself.
    pub fn insert(&self, run: ImportRun) {
        self.runs.insert(run.id, run);
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create(&self, label: &str) -> Result<ImportRun, StoreError> {
        let run = ImportRun::new(label);
        self.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImportRun>, StoreError> {
        Ok(self.runs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn finalize_if_running(
        &self,
        id: Uuid,
        completion: RunCompletion,
    ) -> Result<bool, StoreError> {
        let Some(mut run) = self.runs.get_mut(&id) else {
            return Err(StoreError::NotFound {
                entity: "ImportRun",
                id: id.to_string(),
            });
        };
        if run.status.is_terminal() {
            return Ok(false);
        }
        run.status = completion.status;
        run.end_time = Some(completion.end_time);
        run.errors.extend(completion.errors);
        if let Some(counters) = completion.counters {
            run.counters = counters;
        }
        run.processing_time_ms = Some(
            completion
                .end_time
                .signed_duration_since(run.start_time)
                .num_milliseconds(),
        );
        Ok(true)
    }

    async fn find_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<ImportRun>, StoreError> {
        Ok(self
            .runs
            .iter()
            .filter(|entry| !entry.status.is_terminal() && entry.start_time < cutoff)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list(&self, filter: &RunFilter) -> Result<Vec<ImportRun>, StoreError> {
        let mut runs: Vec<ImportRun> = self
            .runs
            .iter()
            .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
            .map(|entry| entry.value().clone())
            .collect();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        let page = runs
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }

    async fn count(&self, filter: &RunFilter) -> Result<u64, StoreError> {
        Ok(self
            .runs
            .iter()
            .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
            .count() as u64)
    }
}
