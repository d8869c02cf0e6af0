use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::new_id;

/// Groups monitors under an account owner.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[builder(field_defaults(setter(into)))]
pub struct Project {
    #[builder(default = new_id())]
    pub id: Uuid,
    #[builder(default = "Default".to_string())]
    pub name: String,
    /// Fallback recipient when no enabled targets exist
    #[builder(default)]
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_target_kind", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    Email,
}

/// A delivery destination configured on a project.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[builder(field_defaults(setter(into)))]
pub struct NotificationTarget {
    #[builder(default = new_id())]
    pub id: Uuid,
    pub project_id: Uuid,
    #[builder(default = TargetKind::Email)]
    pub kind: TargetKind,
    pub value: String,
    #[builder(default = true)]
    pub enabled: bool,
}
