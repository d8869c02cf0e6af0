//! Durable job queue trait and job payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueResult;

/// Queue name for scheduler ticks.
pub const SCHEDULER_QUEUE: &str = "scheduler";

/// Queue name for per-monitor runs.
pub const RUN_MONITOR_QUEUE: &str = "run-monitor";

/// Work item consumed by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchJob {
    /// Claim due monitors and enqueue their runs
    Scheduler,
    /// Run the pipeline for one monitor
    RunMonitor { monitor_id: Uuid },
}

impl WatchJob {
    /// Named queue this job belongs to.
    pub fn queue_name(&self) -> &'static str {
        match self {
            WatchJob::Scheduler => SCHEDULER_QUEUE,
            WatchJob::RunMonitor { .. } => RUN_MONITOR_QUEUE,
        }
    }

    /// Only one pending/running job may exist per key.
    ///
    /// Scheduler ticks share a key so a slow tick never stacks up behind
    /// the cron trigger. Monitor runs have none: a manual run may overlap a
    /// scheduled one.
    pub fn idempotency_key(&self) -> Option<String> {
        match self {
            WatchJob::Scheduler => Some(SCHEDULER_QUEUE.to_string()),
            WatchJob::RunMonitor { .. } => None,
        }
    }

    /// Retries after the first failed attempt.
    pub fn max_retries(&self) -> i32 {
        match self {
            WatchJob::Scheduler => 0,
            WatchJob::RunMonitor { .. } => 3,
        }
    }
}

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(Uuid),
    /// Job already exists (idempotency hit), returns existing job ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job: WatchJob,
    /// 1 for the first attempt
    pub attempt: i32,
}

/// Backoff before retry number `retry_count + 1`, capped at one hour.
pub fn retry_delay_secs(retry_count: i32) -> i64 {
    2i64.pow(retry_count.clamp(0, 12) as u32).min(3600)
}

/// Trait for job queue operations.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job for immediate execution.
    ///
    /// If the job has an idempotency key and a matching pending/running job
    /// exists, returns `EnqueueResult::Duplicate` with the existing job ID.
    async fn enqueue(&self, job: WatchJob) -> QueueResult<EnqueueResult>;

    /// Claim up to `limit` ready jobs for processing.
    async fn claim(&self, worker_id: &str, limit: i64) -> QueueResult<Vec<ClaimedJob>>;

    /// Mark a job as successfully completed.
    async fn mark_succeeded(&self, job_id: Uuid) -> QueueResult<()>;

    /// Mark a job as failed.
    ///
    /// If retries remain the job is rescheduled with exponential backoff,
    /// otherwise it is moved to dead letter.
    async fn mark_failed(&self, job_id: Uuid, error: &str) -> QueueResult<()>;
}
