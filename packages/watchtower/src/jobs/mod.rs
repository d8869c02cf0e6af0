//! Durable job queues and the worker that drains them.
//!
//! ```text
//! cron (tokio-cron-scheduler)
//!     └─► enqueue Scheduler tick
//!
//! JobWorker
//!     ├─► claim jobs (JobQueue)
//!     ├─► Scheduler  ─► run_scheduler ─► enqueue RunMonitor per won claim
//!     ├─► RunMonitor ─► run_monitor
//!     └─► mark succeeded/failed (retry with backoff, then dead letter)
//! ```

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod worker;

pub use memory::{JobStatus, MemoryJobQueue, QueuedJob};
#[cfg(feature = "postgres")]
pub use postgres::PostgresJobQueue;
pub use worker::{start_worker, JobWorker, WorkerHandle};
