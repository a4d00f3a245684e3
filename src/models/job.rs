use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized job posting.
///
/// Records are uniquely identified by `(source_feed, external_id)`; repeated
/// imports of the same logical posting collapse into an update of one stored
/// record. The pipeline never deletes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub job_type: String,
    pub category: String,
    pub salary: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Source-provided guid, or an id synthesized deterministically from the
    /// item content when the feed provides none.
    pub external_id: String,
    pub source_url: String,
    /// Identifier of the originating feed.
    pub source_feed: String,
}

impl JobRecord {
    pub fn key(&self) -> JobKey {
        JobKey {
            source_feed: self.source_feed.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

/// Unique identity of a job record within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub source_feed: String,
    pub external_id: String,
}
