//! Application-wide error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::queue::QueueError;
use crate::store::StoreError;

/// Application-wide error type covering all failure domains of the
/// ingestion pipeline.
///
/// Item-level failures never reach this type: they are absorbed into run
/// counters by the import coordinator. What surfaces here are the run- and
/// task-level errors that drive retry, backoff, and final run status.
#[derive(Error, Debug)]
pub enum AppError {
    /// Feed-level fetch failure (network, timeout, bad status, parse)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Persistence failure outside the per-record containment loop
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Queue operation failure
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Run-level wall-clock budget exceeded; aborts the processing loop
    #[error("import timed out after {budget_secs} seconds")]
    RunTimeout { budget_secs: u64 },

    /// Configuration error
    #[error("configuration error")]
    Configuration {
        #[source]
        source: ConfigError,
    },

    /// Internal error for unexpected failures
    #[error("internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        AppError::Configuration { source: error }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
