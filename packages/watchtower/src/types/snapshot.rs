use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::new_id;

/// Which fetch strategy produced a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fetch_source", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchSource {
    Browser,
    HttpFallback,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchSource::Browser => "BROWSER",
            FetchSource::HttpFallback => "HTTP_FALLBACK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "snapshot_content_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Text,
    Html,
}

/// Immutable capture of normalized page content.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[builder(field_defaults(setter(into)))]
pub struct Snapshot {
    #[builder(default = new_id())]
    pub id: Uuid,
    pub monitor_id: Uuid,
    #[builder(default = Utc::now())]
    pub captured_at: DateTime<Utc>,
    pub source: FetchSource,
    #[builder(default)]
    pub http_status: Option<i32>,
    pub content_type: ContentType,
    pub content: String,
    #[serde(skip_serializing)]
    #[builder(default)]
    pub screenshot: Option<Vec<u8>>,
    #[builder(default)]
    pub screenshot_mime: Option<String>,
    pub hash: String,
    /// Title, final URL, timings and fetch strategy
    #[builder(default = serde_json::Value::Null)]
    pub raw_meta: serde_json::Value,
}
