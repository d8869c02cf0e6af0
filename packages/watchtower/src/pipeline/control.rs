//! Manual operations exposed to the dashboard and CLI.

use tracing::info;
use uuid::Uuid;

use super::deps::WatchDeps;
use crate::error::ControlError;
use crate::traits::queue::{EnqueueResult, WatchJob};
use crate::types::MonitorStatus;

/// Enqueue an immediate run outside the schedule.
///
/// Does not touch `next_due_at`, so it may race a scheduled run.
pub async fn request_run(deps: &WatchDeps, monitor_id: Uuid) -> Result<EnqueueResult, ControlError> {
    let monitor = deps
        .store
        .get_monitor(monitor_id)
        .await?
        .ok_or(ControlError::NotFound(monitor_id))?;

    if monitor.status != MonitorStatus::Active {
        return Err(ControlError::NotActive(monitor.status));
    }

    let result = deps.queue.enqueue(WatchJob::RunMonitor { monitor_id }).await?;
    info!(monitor_id = %monitor_id, job_id = %result.job_id(), "manual run requested");
    Ok(result)
}

/// Reactivate a paused or errored monitor and clear its error state.
pub async fn resume_monitor(deps: &WatchDeps, monitor_id: Uuid) -> Result<(), ControlError> {
    if !deps.store.resume(monitor_id).await? {
        return Err(ControlError::NotFound(monitor_id));
    }
    info!(monitor_id = %monitor_id, "monitor resumed");
    Ok(())
}
