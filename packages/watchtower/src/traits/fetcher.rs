//! Page fetching strategy trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use url::Url;

use crate::error::FetchResult;
use crate::types::FetchSource;

/// A retrieved page, rendered or raw.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub title: Option<String>,
    /// URL after redirects
    pub final_url: String,
    pub status: Option<u16>,
    pub source: FetchSource,
    /// Full-page PNG when requested and captured
    pub screenshot: Option<Vec<u8>>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl FetchedPage {
    /// Metadata persisted alongside the snapshot.
    pub fn raw_meta(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "finalUrl": self.final_url,
            "strategy": self.source.as_str(),
            "timings": {
                "startedAt": self.started_at,
                "durationMs": self.duration_ms,
            },
        })
    }
}

/// Strategy for retrieving a page.
///
/// Implementations must release any session they acquire on every exit path.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a validated URL, optionally with a screenshot.
    async fn fetch(&self, url: &Url, screenshot: bool) -> FetchResult<FetchedPage>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}
