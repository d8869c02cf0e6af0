//! In-memory job queue for tests and single-process development.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::traits::queue::{retry_delay_secs, ClaimedJob, EnqueueResult, JobQueue, WatchJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    DeadLetter,
}

/// A job as held by the memory queue.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: WatchJob,
    pub status: JobStatus,
    pub run_at: DateTime<Utc>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub worker_id: Option<String>,
    pub error: Option<String>,
}

impl QueuedJob {
    fn is_live(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }
}

/// Job queue backed by a vector behind a single lock.
///
/// All state transitions happen under the write lock, so concurrent claimers
/// never receive the same job.
pub struct MemoryJobQueue {
    jobs: RwLock<Vec<QueuedJob>>,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the retained jobs, oldest first. Succeeded jobs are
    /// dropped; dead letters stay for inspection.
    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.jobs.read().unwrap().clone()
    }

    /// Payloads of jobs waiting to run.
    pub fn pending_jobs(&self) -> Vec<WatchJob> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.job.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_jobs().len()
    }

    pub fn dead_letters(&self) -> Vec<QueuedJob> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::DeadLetter)
            .cloned()
            .collect()
    }

    /// Make every pending job ready now, skipping retry backoff.
    pub fn expire_backoff(&self) {
        let now = Utc::now();
        for job in self.jobs.write().unwrap().iter_mut() {
            if job.status == JobStatus::Pending {
                job.run_at = now;
            }
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: WatchJob) -> QueueResult<EnqueueResult> {
        let mut jobs = self.jobs.write().unwrap();

        if let Some(key) = job.idempotency_key() {
            if let Some(existing) = jobs
                .iter()
                .find(|j| j.is_live() && j.job.idempotency_key().as_deref() == Some(key.as_str()))
            {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let queued = QueuedJob {
            id: Uuid::new_v4(),
            max_retries: job.max_retries(),
            job,
            status: JobStatus::Pending,
            run_at: Utc::now(),
            retry_count: 0,
            worker_id: None,
            error: None,
        };
        let id = queued.id;
        jobs.push(queued);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> QueueResult<Vec<ClaimedJob>> {
        let now = Utc::now();
        let mut jobs = self.jobs.write().unwrap();
        let mut claimed = Vec::new();

        for job in jobs.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if job.status == JobStatus::Pending && job.run_at <= now {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                claimed.push(ClaimedJob {
                    id: job.id,
                    job: job.job.clone(),
                    attempt: job.retry_count + 1,
                });
            }
        }

        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> QueueResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        let index = jobs
            .iter()
            .position(|j| j.id == job_id)
            .ok_or(QueueError::NotFound(job_id))?;
        jobs.remove(index);
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> QueueResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(QueueError::NotFound(job_id))?;

        job.error = Some(error.to_string());
        job.worker_id = None;
        if job.retry_count < job.max_retries {
            job.run_at = Utc::now() + Duration::seconds(retry_delay_secs(job.retry_count));
            job.retry_count += 1;
            job.status = JobStatus::Pending;
        } else {
            job.status = JobStatus::DeadLetter;
        }
        Ok(())
    }
}
