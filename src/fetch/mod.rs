//! Feed retrieval with isolated per-feed failure.

mod client;
mod error;
pub mod rss;
#[cfg(test)]
pub(crate) mod testserver;

pub use client::build_http_client;
pub use error::FetchError;

use futures::future;

use crate::extract::extract_record;
use crate::models::JobRecord;

/// Retrieves and parses feed endpoints, delegating item normalization to the
/// extractor. The injected client carries the request timeout.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetches and parses one feed.
    ///
    /// Either the whole document parses or the feed contributes zero
    /// records; there is no partial item list from a mid-failure. Items the
    /// extractor rejects are skipped and not counted as fetched.
    pub async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<JobRecord>, FetchError> {
        tracing::info!(feed = %feed_url, "fetching feed");

        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: feed_url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: feed_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: feed_url.to_string(),
            source,
        })?;

        let items = rss::parse_items(&body).map_err(|error| FetchError::Parse {
            url: feed_url.to_string(),
            message: error.to_string(),
        })?;

        let records: Vec<JobRecord> = items
            .iter()
            .filter_map(|item| extract_record(item, feed_url))
            .collect();

        tracing::debug!(feed = %feed_url, records = records.len(), "feed parsed");
        Ok(records)
    }

    /// Fetches all feeds concurrently and independently.
    ///
    /// A failed feed is excluded from the aggregate with only a log line;
    /// the caller gets no explicit signal and the run's error list never
    /// sees it. Run counters reflect surviving feeds only.
    pub async fn fetch_all(&self, feed_urls: &[String]) -> Vec<(String, Vec<JobRecord>)> {
        let fetches = feed_urls.iter().map(|feed_url| async move {
            (feed_url.clone(), self.fetch_feed(feed_url).await)
        });

        future::join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(feed_url, outcome)| match outcome {
                Ok(records) => Some((feed_url, records)),
                Err(error) => {
                    tracing::error!(feed = %feed_url, %error, "feed fetch failed, excluded from run");
                    None
                }
            })
            .collect()
    }
}
