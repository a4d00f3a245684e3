//! Configuration settings structures for jobsync
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::queue::DispatcherConfig;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "jobsync".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_feed_urls() -> Vec<String> {
    [
        "https://jobicy.com/?feed=job_feed",
        "https://jobicy.com/?feed=job_feed&job_categories=smm&job_types=full-time",
        "https://jobicy.com/?feed=job_feed&job_categories=seller&job_types=full-time&search_region=france",
        "https://jobicy.com/?feed=job_feed&job_categories=design-multimedia",
        "https://jobicy.com/?feed=job_feed&job_categories=data-science",
        "https://jobicy.com/?feed=job_feed&job_categories=copywriting",
        "https://jobicy.com/?feed=job_feed&job_categories=business",
        "https://jobicy.com/?feed=job_feed&job_categories=management",
        "https://www.higheredjobs.com/rss/articleFeed.cfm",
    ]
    .map(str::to_string)
    .to_vec()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_run_timeout() -> u64 {
    600
}

fn default_concurrency() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    5000
}

fn default_keep_completed() -> usize {
    100
}

fn default_keep_failed() -> usize {
    50
}

fn default_stall_threshold() -> u64 {
    30
}

fn default_stall_check_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_cron() -> String {
    // Hourly, on the hour (seconds-resolution cron).
    "0 0 * * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_stalled_after() -> u64 {
    120
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Section structures
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

/// Feed endpoints to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_feed_urls")]
    pub urls: Vec<String>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            urls: default_feed_urls(),
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds; bounds every feed fetch.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Import run processing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Wall-clock budget for one run's record-processing loop, in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout(),
        }
    }
}

/// Task queue and worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Worker pool size.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Total execution attempts per task before dead-lettering.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Retained completed-task records.
    #[serde(default = "default_keep_completed")]
    pub keep_completed: usize,

    /// Retained failed-task records.
    #[serde(default = "default_keep_failed")]
    pub keep_failed: usize,

    /// Active tasks running longer than this are reported stalled, in seconds.
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_secs: u64,

    #[serde(default = "default_stall_check_interval")]
    pub stall_check_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            keep_completed: default_keep_completed(),
            keep_failed: default_keep_failed(),
            stall_threshold_secs: default_stall_threshold(),
            stall_check_interval_secs: default_stall_check_interval(),
        }
    }
}

impl QueueConfig {
    /// Converts into the dispatcher's runtime configuration.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
            retry_base_delay: std::time::Duration::from_millis(self.retry_base_delay_ms),
            keep_completed: self.keep_completed,
            keep_failed: self.keep_failed,
            stall_threshold: std::time::Duration::from_secs(self.stall_threshold_secs),
            stall_check_interval: std::time::Duration::from_secs(self.stall_check_interval_secs),
        }
    }
}

/// Periodic full-refresh scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds-resolution cron expression.
    #[serde(default = "default_cron")]
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            timezone: default_timezone(),
        }
    }
}

/// Stalled-run reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Runs still `running` after this many seconds are force-failed.
    #[serde(default = "default_stalled_after")]
    pub stalled_after_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            stalled_after_secs: default_stalled_after(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
///
/// This structure represents the entire configuration that can be loaded
/// from TOML files and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub feeds: FeedsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}

impl Settings {
    /// Validates the loaded settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.urls.is_empty() {
            return Err(ConfigError::validation(
                "feeds.urls",
                "at least one feed URL is required",
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "http.request_timeout_secs",
                "request timeout must be positive",
            ));
        }
        if self.import.run_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "import.run_timeout_secs",
                "run timeout must be positive",
            ));
        }
        if self.queue.concurrency == 0 {
            return Err(ConfigError::validation(
                "queue.concurrency",
                "worker concurrency must be at least 1",
            ));
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::validation(
                "queue.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.scheduler.enabled && self.scheduler.cron.trim().is_empty() {
            return Err(ConfigError::validation(
                "scheduler.cron",
                "cron expression cannot be empty",
            ));
        }
        if self.reconciler.stalled_after_secs == 0 {
            return Err(ConfigError::validation(
                "reconciler.stalled_after_secs",
                "stalled window must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.application.name, "jobsync");
        assert_eq!(settings.feeds.urls.len(), 9);
        assert_eq!(settings.http.request_timeout_secs, 30);
        assert_eq!(settings.import.run_timeout_secs, 600);
        assert_eq!(settings.queue.concurrency, 5);
        assert_eq!(settings.queue.max_attempts, 3);
        assert_eq!(settings.queue.retry_base_delay_ms, 5000);
        assert_eq!(settings.queue.keep_completed, 100);
        assert_eq!(settings.queue.keep_failed, 50);
        assert!(settings.scheduler.enabled);
        assert_eq!(settings.scheduler.cron, "0 0 * * * *");
        assert_eq!(settings.scheduler.timezone, "UTC");
        assert_eq!(settings.reconciler.stalled_after_secs, 120);
        assert_eq!(settings.reconciler.sweep_interval_secs, 60);
        assert_eq!(settings.logger.level, "info");
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let settings = Settings::default();
        let toml_str = toml::to_string(&settings).expect("Failed to serialize");
        let deserialized: Settings = toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let toml_str = r#"
            [feeds]
            urls = ["https://feeds.test/a"]

            [queue]
            concurrency = 2
        "#;

        let settings: Settings = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(settings.feeds.urls, vec!["https://feeds.test/a"]);
        assert_eq!(settings.queue.concurrency, 2);
        assert_eq!(settings.queue.max_attempts, 3); // default
        assert_eq!(settings.import.run_timeout_secs, 600); // default
    }

    #[test]
    fn test_validate_rejects_empty_feeds() {
        let mut settings = Settings::default();
        settings.feeds.urls.clear();
        let result = settings.validate();
        assert!(result.is_err());
        if let Err(ConfigError::ValidationError { field, .. }) = result {
            assert_eq!(field, "feeds.urls");
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut settings = Settings::default();
        settings.queue.concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = Settings::default();
        settings.queue.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_cron_when_enabled() {
        let mut settings = Settings::default();
        settings.scheduler.cron = "  ".to_string();
        assert!(settings.validate().is_err());

        settings.scheduler.enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_dispatcher_config_conversion() {
        let queue = QueueConfig::default();
        let dispatcher = queue.dispatcher_config();
        assert_eq!(dispatcher.concurrency, 5);
        assert_eq!(dispatcher.retry_base_delay, std::time::Duration::from_secs(5));
        assert_eq!(dispatcher.stall_threshold, std::time::Duration::from_secs(30));
    }
}
