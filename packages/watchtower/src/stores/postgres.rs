//! PostgreSQL storage implementation.
//!
//! The scheduler claim and the failure counter are single conditional
//! `UPDATE` statements, so they stay atomic across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{MonitorStore, NotificationContext, SuccessUpdate};
use crate::types::{
    ChangeEvent, JobRun, Monitor, MonitorStatus, NotificationTarget, Project, Snapshot,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))
    }

    pub async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query("INSERT INTO projects (id, name, owner_email) VALUES ($1, $2, $3)")
            .bind(project.id)
            .bind(&project.name)
            .bind(&project.owner_email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_target(&self, target: &NotificationTarget) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_targets (id, project_id, kind, value, enabled)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(target.id)
        .bind(target.project_id)
        .bind(target.kind)
        .bind(&target.value)
        .bind(target.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_monitor(&self, monitor: &Monitor) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitors (
                id, project_id, name, url, mode, selector, ignore_selectors, keywords,
                frequency, sensitivity, status, last_hash, last_snapshot_id, last_checked_at,
                consecutive_errors, last_error, next_due_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(monitor.id)
        .bind(monitor.project_id)
        .bind(&monitor.name)
        .bind(&monitor.url)
        .bind(monitor.mode)
        .bind(&monitor.selector)
        .bind(&monitor.ignore_selectors)
        .bind(&monitor.keywords)
        .bind(monitor.frequency)
        .bind(monitor.sensitivity)
        .bind(monitor.status)
        .bind(&monitor.last_hash)
        .bind(monitor.last_snapshot_id)
        .bind(monitor.last_checked_at)
        .bind(monitor.consecutive_errors)
        .bind(&monitor.last_error)
        .bind(monitor.next_due_at)
        .bind(monitor.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite a monitor's status, as the dashboard does when pausing.
    pub async fn set_status(&self, monitor_id: Uuid, status: MonitorStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE monitors SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(monitor_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl MonitorStore for PostgresStore {
    async fn start_run(&self, monitor_id: Uuid) -> StoreResult<JobRun> {
        let run = JobRun::start(monitor_id);
        sqlx::query("INSERT INTO job_runs (id, monitor_id, started_at) VALUES ($1, $2, $3)")
            .bind(run.id)
            .bind(run.monitor_id)
            .bind(run.started_at)
            .execute(&self.pool)
            .await?;
        Ok(run)
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        success: bool,
        error: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE job_runs SET finished_at = NOW(), success = $1, error = $2 WHERE id = $3",
        )
        .bind(success)
        .bind(error)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_monitor(&self, id: Uuid) -> StoreResult<Option<Monitor>> {
        let monitor = sqlx::query_as::<_, Monitor>("SELECT * FROM monitors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(monitor)
    }

    async fn record_success(&self, monitor_id: Uuid, update: &SuccessUpdate) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE monitors
            SET last_hash = $1,
                last_snapshot_id = $2,
                last_checked_at = $3,
                consecutive_errors = 0,
                last_error = NULL,
                status = CASE WHEN status = 'PAUSED' THEN status ELSE 'ACTIVE' END
            WHERE id = $4
            "#,
        )
        .bind(&update.last_hash)
        .bind(update.last_snapshot_id)
        .bind(update.checked_at)
        .bind(monitor_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        monitor_id: Uuid,
        error: &str,
        escalate: bool,
        threshold: i32,
    ) -> StoreResult<Option<MonitorStatus>> {
        let status = sqlx::query_scalar::<_, MonitorStatus>(
            r#"
            UPDATE monitors
            SET consecutive_errors = consecutive_errors + 1,
                last_error = $1,
                last_checked_at = NOW(),
                status = CASE
                    WHEN $2 OR consecutive_errors + 1 > $3 THEN 'ERROR'::monitor_status
                    ELSE status
                END
            WHERE id = $4
            RETURNING status
            "#,
        )
        .bind(error)
        .bind(escalate)
        .bind(threshold)
        .bind(monitor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>> {
        let monitors = sqlx::query_as::<_, Monitor>(
            r#"
            SELECT * FROM monitors
            WHERE status = 'ACTIVE' AND next_due_at <= $1
            ORDER BY next_due_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(monitors)
    }

    async fn claim_due(
        &self,
        monitor_id: Uuid,
        now: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET next_due_at = $1
            WHERE id = $2 AND status = 'ACTIVE' AND next_due_at <= $3
            "#,
        )
        .bind(next)
        .bind(monitor_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn resume(&self, monitor_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET status = 'ACTIVE', consecutive_errors = 0, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(monitor_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (
                id, monitor_id, captured_at, source, http_status, content_type, content,
                screenshot, screenshot_mime, hash, raw_meta
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.monitor_id)
        .bind(snapshot.captured_at)
        .bind(snapshot.source)
        .bind(snapshot.http_status)
        .bind(snapshot.content_type)
        .bind(&snapshot.content)
        .bind(&snapshot.screenshot)
        .bind(&snapshot.screenshot_mime)
        .bind(&snapshot.hash)
        .bind(&snapshot.raw_meta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>> {
        let snapshot = sqlx::query_as::<_, Snapshot>("SELECT * FROM snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(snapshot)
    }

    async fn recent_snapshots(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<Snapshot>> {
        let snapshots = sqlx::query_as::<_, Snapshot>(
            r#"
            SELECT * FROM snapshots
            WHERE monitor_id = $1
            ORDER BY captured_at DESC
            LIMIT $2
            "#,
        )
        .bind(monitor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(snapshots)
    }

    async fn insert_change_event(&self, event: &ChangeEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO change_events (
                id, monitor_id, previous_snapshot_id, current_snapshot_id, diff_html, diff_text,
                summary, importance_score, created_at, notified_at, notify_error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id)
        .bind(event.monitor_id)
        .bind(event.previous_snapshot_id)
        .bind(event.current_snapshot_id)
        .bind(&event.diff_html)
        .bind(&event.diff_text)
        .bind(&event.summary)
        .bind(event.importance_score)
        .bind(event.created_at)
        .bind(event.notified_at)
        .bind(&event.notify_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_notified(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE change_events SET notified_at = $1, notify_error = NULL WHERE id = $2",
        )
        .bind(at)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_notify_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        sqlx::query("UPDATE change_events SET notify_error = $1 WHERE id = $2")
            .bind(error)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_change_events(
        &self,
        monitor_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ChangeEvent>> {
        let events = sqlx::query_as::<_, ChangeEvent>(
            r#"
            SELECT * FROM change_events
            WHERE monitor_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(monitor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn recent_job_runs(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<JobRun>> {
        let runs = sqlx::query_as::<_, JobRun>(
            r#"
            SELECT * FROM job_runs
            WHERE monitor_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(monitor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    async fn notification_context(&self, project_id: Uuid) -> StoreResult<NotificationContext> {
        let targets = sqlx::query_as::<_, NotificationTarget>(
            "SELECT * FROM notification_targets WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let owner_email = sqlx::query_scalar::<_, Option<String>>(
            "SELECT owner_email FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        Ok(NotificationContext {
            targets,
            owner_email,
        })
    }
}
