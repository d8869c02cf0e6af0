use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::new_id;

/// Ledger entry for one orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct JobRun {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub error: Option<String>,
}

impl JobRun {
    /// Open a new ledger entry.
    pub fn start(monitor_id: Uuid) -> Self {
        Self {
            id: new_id(),
            monitor_id,
            started_at: Utc::now(),
            finished_at: None,
            success: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }
}
