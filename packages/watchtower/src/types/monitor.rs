use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::new_id;

/// What part of the page is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "monitor_mode", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorMode {
    /// Visible body text
    #[default]
    TextOnly,
    /// Serialized body markup
    FullHtml,
    /// Text of the elements matching `selector`
    Selector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "monitor_frequency", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    /// Interval between scheduled runs.
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "monitor_sensitivity", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sensitivity {
    /// Filter timestamp churn and tiny edits
    #[default]
    MeaningfulOnly,
    /// Any non-whitespace change is reported
    AnyChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "monitor_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorStatus {
    #[default]
    Active,
    Paused,
    /// Auto-paused after repeated or configuration failures
    Error,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Active => "ACTIVE",
            MonitorStatus::Paused => "PAUSED",
            MonitorStatus::Error => "ERROR",
        }
    }
}

/// A tracked URL with its extraction and sensitivity settings.
///
/// `last_hash`/`last_snapshot_id` always point at the latest-seen capture,
/// not the latest meaningful one. `next_due_at` is only advanced by the
/// scheduler's conditional claim.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[builder(field_defaults(setter(into)))]
pub struct Monitor {
    #[builder(default = new_id())]
    pub id: Uuid,
    pub project_id: Uuid,
    #[builder(default)]
    pub name: Option<String>,
    pub url: String,
    #[builder(default)]
    pub mode: MonitorMode,
    #[builder(default)]
    pub selector: Option<String>,
    #[builder(default)]
    pub ignore_selectors: Vec<String>,
    #[builder(default)]
    pub keywords: Vec<String>,
    #[builder(default)]
    pub frequency: Frequency,
    #[builder(default)]
    pub sensitivity: Sensitivity,
    #[builder(default)]
    pub status: MonitorStatus,
    #[builder(default)]
    pub last_hash: Option<String>,
    #[builder(default)]
    pub last_snapshot_id: Option<Uuid>,
    #[builder(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub consecutive_errors: i32,
    #[builder(default)]
    pub last_error: Option<String>,
    #[builder(default = Utc::now())]
    pub next_due_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    /// Name shown in notifications, falling back to the URL.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }

    /// Whether a scheduler tick at `now` should claim this monitor.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MonitorStatus::Active && self.next_due_at <= now
    }
}
