//! Scheduler tick: claim due monitors and enqueue their runs.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::deps::WatchDeps;
use crate::error::WorkerError;
use crate::traits::queue::WatchJob;

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// ACTIVE monitors found due
    pub due: usize,
    /// Claims this tick won
    pub claimed: usize,
    /// Runs newly enqueued
    pub enqueued: usize,
}

/// Claim every due monitor and enqueue one run per won claim.
///
/// The next due time is computed from the tick time, not from when the run
/// finishes, so a run that outlasts its interval may overlap the next one.
/// Concurrent ticks are safe: the conditional claim lets exactly one caller
/// win each due cycle. A claim whose enqueue fails is released again.
#[instrument(skip_all)]
pub async fn run_scheduler(deps: &WatchDeps) -> Result<SchedulerReport, WorkerError> {
    let now = Utc::now();
    let due = deps.store.find_due(now).await?;
    let mut report = SchedulerReport {
        due: due.len(),
        ..Default::default()
    };

    if due.is_empty() {
        debug!("no monitors due");
        return Ok(report);
    }

    for monitor in due {
        let next = now + monitor.frequency.interval();
        if !deps.store.claim_due(monitor.id, now, next).await? {
            debug!(monitor_id = %monitor.id, "claim lost to another tick");
            continue;
        }
        report.claimed += 1;

        match deps
            .queue
            .enqueue(WatchJob::RunMonitor {
                monitor_id: monitor.id,
            })
            .await
        {
            Ok(result) if result.is_created() => report.enqueued += 1,
            Ok(_) => {}
            Err(e) => {
                warn!(monitor_id = %monitor.id, error = %e, "failed to enqueue monitor run");
                // Swap next_due_at back to the tick time so the next tick retries.
                match deps.store.claim_due(monitor.id, next, now).await {
                    Ok(true) => debug!(monitor_id = %monitor.id, "claim released"),
                    Ok(false) => {}
                    Err(e) => warn!(monitor_id = %monitor.id, error = %e, "failed to release claim"),
                }
            }
        }
    }

    info!(
        due = report.due,
        claimed = report.claimed,
        enqueued = report.enqueued,
        "scheduler tick complete"
    );
    Ok(report)
}
