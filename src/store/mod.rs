//! Persistence contracts for the ingestion pipeline.
//!
//! The concrete storage technology is an external collaborator; the pipeline
//! only depends on these trait contracts. [`memory`] provides the in-process
//! reference implementation used by the default wiring and by tests.

mod memory;

pub use memory::{MemoryJobStore, MemoryRunStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ImportRun, JobKey, JobRecord, RunCounters, RunError, RunStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("store operation failed: {operation}")]
    Backend {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of an atomic upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Store for normalized job records.
///
/// Implementations must enforce uniqueness on `(source_feed, external_id)`
/// and make `upsert` an atomic conditional operation, not a read-then-write
/// pair: two concurrent tasks targeting the same feed may race on the same
/// key, and the store is the only safeguard against duplicate inserts.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn upsert(&self, record: JobRecord) -> Result<UpsertOutcome, StoreError>;

    async fn find_by_key(&self, key: &JobKey) -> Result<Option<JobRecord>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

/// Filter for run-history queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Terminal fields applied by a conditional run transition.
///
/// `errors` are appended to the run's existing error log, never replacing
/// it. `counters` of `None` leaves the run's counters untouched (used by the
/// stalled-run reconciler, which knows nothing about progress).
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub counters: Option<RunCounters>,
    pub errors: Vec<RunError>,
    pub end_time: DateTime<Utc>,
}

/// Store for import run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Creates a new run in `Running` state.
    async fn create(&self, label: &str) -> Result<ImportRun, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ImportRun>, StoreError>;

    /// Conditional terminal transition: applies only while the run is still
    /// `Running`. Returns `false` when the run was already terminal, so a
    /// late finalize cannot clobber a reconciler force-fail or vice versa.
    async fn finalize_if_running(
        &self,
        id: Uuid,
        completion: RunCompletion,
    ) -> Result<bool, StoreError>;

    /// Runs still `Running` whose start time is older than `cutoff`.
    async fn find_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<ImportRun>, StoreError>;

    /// Runs matching `filter`, newest first.
    async fn list(&self, filter: &RunFilter) -> Result<Vec<ImportRun>, StoreError>;

    async fn count(&self, filter: &RunFilter) -> Result<u64, StoreError>;
}
