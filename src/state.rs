//! Application state wiring.
//!
//! All client handles are constructed here and injected into components;
//! nothing in the pipeline reaches for ambient global state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::fetch::{FeedFetcher, build_http_client};
use crate::import::{ImportCoordinator, ImportRunner};
use crate::queue::WorkDispatcher;
use crate::reconcile::StalledRunReconciler;
use crate::services::ImportService;
use crate::store::{JobStore, MemoryJobStore, MemoryRunStore, RunStore};

/// Aggregates the wired pipeline components.
pub struct AppState {
    pub settings: Settings,
    pub jobs: Arc<dyn JobStore>,
    pub runs: Arc<dyn RunStore>,
    pub dispatcher: Arc<WorkDispatcher>,
    pub reconciler: Arc<StalledRunReconciler>,
    pub runner: Arc<ImportRunner>,
    pub imports: ImportService,
}

impl AppState {
    /// Builds the full component graph from settings, backed by the
    /// in-process reference stores.
    pub fn new(settings: Settings) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let runs: Arc<dyn RunStore> = Arc::new(MemoryRunStore::new());

        let client = build_http_client(&settings.http);
        let fetcher = FeedFetcher::new(client);
        let coordinator = ImportCoordinator::new(
            Arc::clone(&jobs),
            Arc::clone(&runs),
            Duration::from_secs(settings.import.run_timeout_secs),
        );
        let runner = Arc::new(ImportRunner::new(
            fetcher,
            coordinator,
            settings.feeds.urls.clone(),
        ));

        let dispatcher = Arc::new(WorkDispatcher::new(settings.queue.dispatcher_config()));
        let reconciler = Arc::new(StalledRunReconciler::new(
            Arc::clone(&runs),
            Duration::from_secs(settings.reconciler.stalled_after_secs),
        ));
        let imports = ImportService::new(
            Arc::clone(&runs),
            Arc::clone(&dispatcher),
            Arc::clone(&reconciler),
        );

        Self {
            settings,
            jobs,
            runs,
            dispatcher,
            reconciler,
            runner,
            imports,
        }
    }
}
