//! Service layer for pipeline operations exposed to callers.

mod import_service;

pub use import_service::{ALL_FEEDS_LABEL, ImportService, RunHistoryPage, TriggeredImport};
