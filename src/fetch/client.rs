//! HTTP client construction.
//!
//! One pooled client is built at startup and handed to every component that
//! talks to the network; nothing reaches for an ambient global.

use std::time::Duration;

use crate::config::HttpConfig;

/// Builds the shared HTTP client from configuration.
///
/// The request timeout bounds every feed fetch end to end; a slow feed
/// surfaces as a per-feed `FetchError`, not a hung worker.
pub fn build_http_client(config: &HttpConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .use_rustls_tls()
        .user_agent(concat!("jobsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_from_default_config() {
        let _ = build_http_client(&HttpConfig::default());
    }
}
