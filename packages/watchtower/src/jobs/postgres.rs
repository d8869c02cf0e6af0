//! PostgreSQL-backed job queue.
//!
//! Jobs live in `watch_jobs`. Claiming uses `FOR UPDATE SKIP LOCKED`, so any
//! number of workers can poll the same table. A running job whose lease has
//! expired (the worker died mid-run) becomes claimable again.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::traits::queue::{retry_delay_secs, ClaimedJob, EnqueueResult, JobQueue, WatchJob};

#[derive(sqlx::FromRow)]
struct ClaimedRow {
    id: Uuid,
    payload: serde_json::Value,
    retry_count: i32,
}

#[derive(sqlx::FromRow)]
struct RetryState {
    retry_count: i32,
    max_retries: i32,
}

/// PostgreSQL job queue implementation.
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_ms: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_ms: 10 * 60 * 1000,
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_duration(pool: PgPool, lease_ms: i64) -> Self {
        Self { pool, lease_ms }
    }

    /// Check if a live job with the given idempotency key already exists.
    pub async fn find_by_idempotency_key(&self, key: &str) -> QueueResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM watch_jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn dead_letter(&self, job_id: Uuid, reason: &str) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE watch_jobs
            SET status = 'dead_letter',
                error = $1,
                dead_lettered_at = NOW(),
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(reason)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, job: WatchJob) -> QueueResult<EnqueueResult> {
        let key = job.idempotency_key();
        if let Some(key) = &key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                return Ok(EnqueueResult::Duplicate(existing));
            }
        }

        let payload = serde_json::to_value(&job)?;
        // The partial unique index backs up the check above under concurrency
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO watch_jobs (id, queue, payload, idempotency_key, max_retries)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(job.queue_name())
        .bind(payload)
        .bind(&key)
        .bind(job.max_retries())
        .fetch_optional(&self.pool)
        .await?;

        match (inserted, key) {
            (Some(id), _) => Ok(EnqueueResult::Created(id)),
            (None, Some(key)) => {
                let existing = self
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| QueueError::Backend(format!("idempotency conflict on {key}").into()))?;
                Ok(EnqueueResult::Duplicate(existing))
            }
            (None, None) => Err(QueueError::Backend("job insert returned no row".into())),
        }
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> QueueResult<Vec<ClaimedJob>> {
        let rows = sqlx::query_as::<_, ClaimedRow>(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM watch_jobs
                WHERE
                    (status = 'pending' AND run_at <= NOW())
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE watch_jobs
            SET
                status = 'running',
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING id, payload, retry_count
            "#,
        )
        .bind(limit)
        .bind(self.lease_ms.to_string())
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<WatchJob>(row.payload) {
                Ok(job) => claimed.push(ClaimedJob {
                    id: row.id,
                    job,
                    attempt: row.retry_count + 1,
                }),
                Err(e) => {
                    error!(job_id = %row.id, error = %e, "undecodable job payload, dead-lettering");
                    self.dead_letter(row.id, &format!("invalid payload: {e}")).await?;
                }
            }
        }

        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> QueueResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE watch_jobs
            SET status = 'succeeded',
                error = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id));
        }
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> QueueResult<()> {
        let state = sqlx::query_as::<_, RetryState>(
            "SELECT retry_count, max_retries FROM watch_jobs WHERE id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QueueError::NotFound(job_id))?;

        if state.retry_count >= state.max_retries {
            return self.dead_letter(job_id, error).await;
        }

        let retry_at = Utc::now() + chrono::Duration::seconds(retry_delay_secs(state.retry_count));
        sqlx::query(
            r#"
            UPDATE watch_jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                run_at = $1,
                error = $2,
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(retry_at)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
