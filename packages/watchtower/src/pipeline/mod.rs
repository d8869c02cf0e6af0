//! Entry points: per-monitor run, scheduler tick and manual controls.

pub mod control;
pub mod deps;
pub mod run;
pub mod schedule;

pub use control::{request_run, resume_monitor};
pub use crate::error::ControlError;
pub use deps::WatchDeps;
pub use run::{run_monitor, RunOutcome};
pub use schedule::{run_scheduler, SchedulerReport};
