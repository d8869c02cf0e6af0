//! Storage trait for monitors and their history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    ChangeEvent, JobRun, Monitor, MonitorStatus, NotificationTarget, Snapshot,
};

/// Bookkeeping written after a successful run.
#[derive(Debug, Clone)]
pub struct SuccessUpdate {
    pub last_hash: String,
    pub last_snapshot_id: Uuid,
    pub checked_at: DateTime<Utc>,
}

/// Who to notify for a monitor's project.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub targets: Vec<NotificationTarget>,
    pub owner_email: Option<String>,
}

/// Durable store used by the pipeline and scheduler.
///
/// `claim_due` and `record_failure` must each be a single atomic
/// conditional update; the scheduler's exactly-once dispatch and the
/// error counter depend on it.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    // Run ledger

    /// Open a ledger entry for one orchestrator invocation.
    async fn start_run(&self, monitor_id: Uuid) -> StoreResult<JobRun>;

    /// Close a ledger entry.
    async fn finish_run(&self, run_id: Uuid, success: bool, error: Option<&str>)
        -> StoreResult<()>;

    // Monitors

    async fn get_monitor(&self, id: Uuid) -> StoreResult<Option<Monitor>>;

    /// Advance the baseline and clear the error state.
    ///
    /// Status becomes ACTIVE unless the monitor was paused while the run was
    /// in flight.
    async fn record_success(&self, monitor_id: Uuid, update: &SuccessUpdate) -> StoreResult<()>;

    /// Increment the error counter and set ERROR when it exceeds `threshold`
    /// or when `escalate` is set. Returns the resulting status, or `None` if
    /// the monitor no longer exists.
    async fn record_failure(
        &self,
        monitor_id: Uuid,
        error: &str,
        escalate: bool,
        threshold: i32,
    ) -> StoreResult<Option<MonitorStatus>>;

    /// ACTIVE monitors with `next_due_at <= now`.
    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>>;

    /// Set `next_due_at = next` only if the monitor is still ACTIVE and due
    /// at `now`. Returns true when this caller won the claim.
    async fn claim_due(
        &self,
        monitor_id: Uuid,
        now: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Reactivate a monitor and clear its error state.
    async fn resume(&self, monitor_id: Uuid) -> StoreResult<bool>;

    // Snapshots

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()>;

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>>;

    async fn recent_snapshots(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<Snapshot>>;

    // Change events

    async fn insert_change_event(&self, event: &ChangeEvent) -> StoreResult<()>;

    async fn mark_notified(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_notify_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()>;

    async fn recent_change_events(
        &self,
        monitor_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ChangeEvent>>;

    async fn recent_job_runs(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<JobRun>>;

    // Recipients

    async fn notification_context(&self, project_id: Uuid) -> StoreResult<NotificationContext>;
}
