use thiserror::Error;

/// Feed-level failure. Always scoped to a single feed: one feed failing
/// never affects the others in an all-feed run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to parse feed {url}: {message}")]
    Parse { url: String, message: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Http { source, .. } if source.is_timeout())
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Http { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Parse { url, .. } => url,
        }
    }
}
