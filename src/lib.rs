//! jobsync library
//!
//! Core library modules for the jobsync feed ingestion service.

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod import;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
