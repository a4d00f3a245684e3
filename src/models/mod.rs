//! Domain models for job records and import runs.

mod import_run;
mod job;

pub use import_run::{ImportRun, RunCounters, RunError, RunStatus};
pub use job::{JobKey, JobRecord};
