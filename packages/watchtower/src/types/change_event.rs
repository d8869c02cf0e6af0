use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::new_id;

/// A classified-as-meaningful difference between two snapshots.
///
/// Append-only apart from the notification outcome fields.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[builder(field_defaults(setter(into)))]
pub struct ChangeEvent {
    #[builder(default = new_id())]
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub previous_snapshot_id: Uuid,
    pub current_snapshot_id: Uuid,
    /// HTML rendering with `<ins>`/`<del>` markers
    pub diff_html: String,
    /// Plain rendering with `[[+ ]]`/`[[- ]]` markers
    pub diff_text: String,
    pub summary: String,
    pub importance_score: i32,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default)]
    pub notified_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub notify_error: Option<String>,
}
