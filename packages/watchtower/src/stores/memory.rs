//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::store::{MonitorStore, NotificationContext, SuccessUpdate};
use crate::types::{
    ChangeEvent, JobRun, Monitor, MonitorStatus, NotificationTarget, Project, Snapshot,
};

/// In-memory storage for monitors and their history.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    projects: RwLock<HashMap<Uuid, Project>>,
    targets: RwLock<Vec<NotificationTarget>>,
    monitors: RwLock<HashMap<Uuid, Monitor>>,
    snapshots: RwLock<Vec<Snapshot>>,
    events: RwLock<Vec<ChangeEvent>>,
    runs: RwLock<Vec<JobRun>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            targets: RwLock::new(Vec::new()),
            monitors: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            runs: RwLock::new(Vec::new()),
        }
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.write().unwrap().insert(project.id, project);
    }

    pub fn insert_target(&self, target: NotificationTarget) {
        self.targets.write().unwrap().push(target);
    }

    pub fn insert_monitor(&self, monitor: Monitor) {
        self.monitors.write().unwrap().insert(monitor.id, monitor);
    }

    /// Overwrite a monitor's status, as the dashboard would when pausing.
    pub fn set_status(&self, monitor_id: Uuid, status: MonitorStatus) {
        if let Some(monitor) = self.monitors.write().unwrap().get_mut(&monitor_id) {
            monitor.status = status;
        }
    }

    /// Remove a snapshot, simulating an externally pruned baseline.
    pub fn delete_snapshot(&self, snapshot_id: Uuid) {
        self.snapshots
            .write()
            .unwrap()
            .retain(|s| s.id != snapshot_id);
    }

    /// Get the number of stored snapshots for a monitor.
    pub fn snapshot_count(&self, monitor_id: Uuid) -> usize {
        self.snapshots
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.monitor_id == monitor_id)
            .count()
    }
}

fn newest_first<T: Clone>(
    items: &[T],
    belongs: impl Fn(&T) -> bool,
    limit: i64,
) -> Vec<T> {
    items
        .iter()
        .rev()
        .filter(|item| belongs(item))
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn start_run(&self, monitor_id: Uuid) -> StoreResult<JobRun> {
        let run = JobRun::start(monitor_id);
        self.runs.write().unwrap().push(run.clone());
        Ok(run)
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        success: bool,
        error: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(run) = self
            .runs
            .write()
            .unwrap()
            .iter_mut()
            .find(|r| r.id == run_id)
        {
            run.finished_at = Some(Utc::now());
            run.success = Some(success);
            run.error = error.map(String::from);
        }
        Ok(())
    }

    async fn get_monitor(&self, id: Uuid) -> StoreResult<Option<Monitor>> {
        Ok(self.monitors.read().unwrap().get(&id).cloned())
    }

    async fn record_success(&self, monitor_id: Uuid, update: &SuccessUpdate) -> StoreResult<()> {
        if let Some(monitor) = self.monitors.write().unwrap().get_mut(&monitor_id) {
            monitor.last_hash = Some(update.last_hash.clone());
            monitor.last_snapshot_id = Some(update.last_snapshot_id);
            monitor.last_checked_at = Some(update.checked_at);
            monitor.consecutive_errors = 0;
            monitor.last_error = None;
            if monitor.status != MonitorStatus::Paused {
                monitor.status = MonitorStatus::Active;
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        monitor_id: Uuid,
        error: &str,
        escalate: bool,
        threshold: i32,
    ) -> StoreResult<Option<MonitorStatus>> {
        let mut monitors = self.monitors.write().unwrap();
        let Some(monitor) = monitors.get_mut(&monitor_id) else {
            return Ok(None);
        };
        monitor.consecutive_errors += 1;
        monitor.last_error = Some(error.to_string());
        monitor.last_checked_at = Some(Utc::now());
        if escalate || monitor.consecutive_errors > threshold {
            monitor.status = MonitorStatus::Error;
        }
        Ok(Some(monitor.status))
    }

    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>> {
        let mut due: Vec<Monitor> = self
            .monitors
            .read()
            .unwrap()
            .values()
            .filter(|m| m.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|m| m.next_due_at);
        Ok(due)
    }

    async fn claim_due(
        &self,
        monitor_id: Uuid,
        now: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut monitors = self.monitors.write().unwrap();
        match monitors.get_mut(&monitor_id) {
            Some(monitor) if monitor.is_due(now) => {
                monitor.next_due_at = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn resume(&self, monitor_id: Uuid) -> StoreResult<bool> {
        let mut monitors = self.monitors.write().unwrap();
        let Some(monitor) = monitors.get_mut(&monitor_id) else {
            return Ok(false);
        };
        monitor.status = MonitorStatus::Active;
        monitor.consecutive_errors = 0;
        monitor.last_error = None;
        Ok(true)
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        self.snapshots.write().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>> {
        Ok(self
            .snapshots
            .read()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn recent_snapshots(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<Snapshot>> {
        let snapshots = self.snapshots.read().unwrap();
        Ok(newest_first(&snapshots, |s| s.monitor_id == monitor_id, limit))
    }

    async fn insert_change_event(&self, event: &ChangeEvent) -> StoreResult<()> {
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }

    async fn mark_notified(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(event) = self
            .events
            .write()
            .unwrap()
            .iter_mut()
            .find(|e| e.id == event_id)
        {
            event.notified_at = Some(at);
            event.notify_error = None;
        }
        Ok(())
    }

    async fn mark_notify_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        if let Some(event) = self
            .events
            .write()
            .unwrap()
            .iter_mut()
            .find(|e| e.id == event_id)
        {
            event.notify_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn recent_change_events(
        &self,
        monitor_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ChangeEvent>> {
        let events = self.events.read().unwrap();
        Ok(newest_first(&events, |e| e.monitor_id == monitor_id, limit))
    }

    async fn recent_job_runs(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<JobRun>> {
        let runs = self.runs.read().unwrap();
        Ok(newest_first(&runs, |r| r.monitor_id == monitor_id, limit))
    }

    async fn notification_context(&self, project_id: Uuid) -> StoreResult<NotificationContext> {
        let owner_email = self
            .projects
            .read()
            .unwrap()
            .get(&project_id)
            .and_then(|p| p.owner_email.clone());
        let targets = self
            .targets
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        Ok(NotificationContext {
            targets,
            owner_email,
        })
    }
}
