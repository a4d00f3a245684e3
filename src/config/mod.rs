//! Configuration loading and validation.

mod error;
mod loader;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    ApplicationConfig, FeedsConfig, HttpConfig, ImportConfig, LoggerSettings, QueueConfig,
    ReconcilerConfig, SchedulerConfig, Settings,
};
