//! Domain records: monitors, their captures, change events and run ledger.

pub mod change_event;
pub mod job_run;
pub mod monitor;
pub mod project;
pub mod snapshot;

pub use change_event::ChangeEvent;
pub use job_run::JobRun;
pub use monitor::{Frequency, Monitor, MonitorMode, MonitorStatus, Sensitivity};
pub use project::{NotificationTarget, Project, TargetKind};
pub use snapshot::{ContentType, FetchSource, Snapshot};

use uuid::Uuid;

/// Time-ordered identifier for new records.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}
