//! Job worker service and the recurring scheduler registration.
//!
//! The `JobWorker` is a long-running loop that:
//! - Claims ready jobs from the `JobQueue`
//! - Dispatches scheduler ticks and monitor runs concurrently
//! - Marks jobs succeeded or failed (the queue handles retries)
//! - Stops claiming on cancellation and lets the current batch finish

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::pipeline::{run_monitor, run_scheduler, WatchDeps};
use crate::traits::queue::{ClaimedJob, WatchJob};

/// A job worker that drains the queue into the pipeline.
pub struct JobWorker {
    deps: Arc<WatchDeps>,
}

impl JobWorker {
    pub fn new(deps: Arc<WatchDeps>) -> Self {
        Self { deps }
    }

    pub fn worker_id(&self) -> &str {
        &self.deps.config.worker.worker_id
    }

    /// Claim one batch and process it. Returns the number of jobs handled.
    pub async fn process_batch(&self) -> Result<usize, WorkerError> {
        let config = &self.deps.config.worker;
        let jobs = self
            .deps
            .queue
            .claim(&config.worker_id, config.batch_size)
            .await?;

        if jobs.is_empty() {
            return Ok(0);
        }

        debug!(count = jobs.len(), "claimed jobs");
        let count = jobs.len();
        join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
        Ok(count)
    }

    /// Process batches until the queue has nothing ready.
    pub async fn drain(&self) -> Result<usize, WorkerError> {
        let mut total = 0;
        loop {
            let handled = self.process_batch().await?;
            if handled == 0 {
                return Ok(total);
            }
            total += handled;
        }
    }

    async fn process_job(&self, claimed: ClaimedJob) {
        let job_id = claimed.id;
        let queue = claimed.job.queue_name();

        let result = match claimed.job {
            WatchJob::Scheduler => run_scheduler(&self.deps).await.map(|_| ()),
            WatchJob::RunMonitor { monitor_id } => run_monitor(&self.deps, monitor_id)
                .await
                .map(|_| ())
                .map_err(WorkerError::from),
        };

        match result {
            Ok(()) => {
                debug!(job_id = %job_id, queue, "job succeeded");
                if let Err(e) = self.deps.queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, queue, attempt = claimed.attempt, error = %e, "job failed");
                if let Err(e) = self.deps.queue.mark_failed(job_id, &e.to_string()).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as failed");
                }
            }
        }
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        let poll_interval = self.deps.config.worker.poll_interval;
        info!(
            worker_id = %self.worker_id(),
            batch_size = self.deps.config.worker.batch_size,
            "job worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.process_batch().await {
                Ok(0) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id(), "job worker stopped");
        Ok(())
    }
}

/// Running worker plus its cron registration.
pub struct WorkerHandle {
    shutdown: CancellationToken,
    scheduler: Option<JobScheduler>,
    task: JoinHandle<Result<(), WorkerError>>,
    grace: Duration,
}

impl WorkerHandle {
    /// Stop the cron trigger, stop claiming and wait for in-flight jobs.
    ///
    /// Jobs still running after the grace period are aborted; the queue
    /// redelivers them.
    pub async fn stop(mut self) -> Result<(), WorkerError> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| WorkerError::Schedule(e.to_string()))?;
        }
        self.shutdown.cancel();

        match tokio::time::timeout(self.grace, &mut self.task).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!(grace_secs = self.grace.as_secs(), "worker did not stop in time, aborting");
                self.task.abort();
                Ok(())
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start consuming the queue and register the recurring scheduler tick.
pub async fn start_worker(deps: Arc<WatchDeps>) -> Result<WorkerHandle, WorkerError> {
    let scheduler = if deps.config.worker.enable_schedule {
        Some(register_schedule(deps.clone()).await?)
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let grace = deps.config.worker.shutdown_grace;
    let worker = JobWorker::new(deps);
    let task = tokio::spawn(worker.run(shutdown.clone()));

    Ok(WorkerHandle {
        shutdown,
        scheduler,
        task,
        grace,
    })
}

async fn register_schedule(deps: Arc<WatchDeps>) -> Result<JobScheduler, WorkerError> {
    let schedule_err = |e: tokio_cron_scheduler::JobSchedulerError| WorkerError::Schedule(e.to_string());
    let cron = deps.config.scheduler_cron.clone();

    let scheduler = JobScheduler::new().await.map_err(schedule_err)?;
    let tick = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let deps = deps.clone();
        Box::pin(async move {
            match deps.queue.enqueue(WatchJob::Scheduler).await {
                Ok(result) if result.is_created() => debug!("scheduler tick enqueued"),
                Ok(_) => debug!("scheduler tick already pending"),
                Err(e) => error!(error = %e, "failed to enqueue scheduler tick"),
            }
        })
    })
    .map_err(schedule_err)?;

    scheduler.add(tick).await.map_err(schedule_err)?;
    scheduler.start().await.map_err(schedule_err)?;

    info!(cron = %cron, "scheduler tick registered");
    Ok(scheduler)
}
