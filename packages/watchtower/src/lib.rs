//! # Watchtower
//!
//! Periodically fetches tracked web pages, diffs each capture against the
//! previous one and notifies subscribers when the change is meaningful.
//!
//! ## Pipeline
//!
//! ```text
//! Scheduler tick
//!     │
//!     └─► claim due monitors (compare-and-swap on next_due_at)
//!             └─► enqueue RunMonitor job
//!                     │
//!                     ▼
//! run_monitor
//!     ├─► validate URL
//!     ├─► fetch (browser, then plain HTTP fallback)
//!     ├─► extract ─► normalize ─► hash ─► persist Snapshot
//!     ├─► diff ─► classify ─► score/summary
//!     └─► ChangeEvent ─► notify (failure recorded, never fatal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchtower::{WatchDeps, MemoryStore, MemoryJobQueue, UrlValidator, start_worker};
//!
//! let validator = UrlValidator::default();
//! let deps = WatchDeps::builder()
//!     .store(Arc::new(MemoryStore::new()))
//!     .queue(Arc::new(MemoryJobQueue::new()))
//!     .fetcher(Arc::new(FallbackFetcher::standard(&config.fetch, validator.clone())?))
//!     .notifier(Arc::new(Notifier::new(Arc::new(mailer))))
//!     .validator(validator)
//!     .config(config)
//!     .build();
//!
//! let handle = start_worker(Arc::new(deps)).await?;
//! // ...
//! handle.stop().await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `browser` (default): headless Chromium fetch strategy via chromiumoxide
//! - `postgres`: PostgreSQL store and job queue

pub mod analysis;
pub mod config;
pub mod content;
pub mod diff;
pub mod error;
pub mod fetchers;
pub mod jobs;
pub mod notify;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

pub use analysis::{classify, score_importance, summarize, ChangeInput};
pub use config::{ClassifierConfig, FetchConfig, WatchConfig, WorkerConfig};
pub use content::{content_hash, extract, normalize};
pub use diff::{diff_words, DiffOp, DiffResult, Snippets};
pub use error::{
    ControlError, ExtractError, FetchError, NotifyError, QueueError, RunError, SecurityError,
    StoreError, WorkerError,
};
pub use fetchers::{FallbackFetcher, HttpFetcher};
#[cfg(feature = "browser")]
pub use fetchers::BrowserFetcher;
pub use jobs::{start_worker, JobWorker, MemoryJobQueue, WorkerHandle};
#[cfg(feature = "postgres")]
pub use jobs::PostgresJobQueue;
pub use notify::{EmailMessage, Notifier, ResendMailer};
pub use pipeline::{
    request_run, resume_monitor, run_monitor, run_scheduler, RunOutcome,
    SchedulerReport, WatchDeps,
};
pub use security::UrlValidator;
pub use stores::MemoryStore;
#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
pub use traits::{
    ClaimedJob, EmailSender, EnqueueResult, FetchedPage, JobQueue, MonitorStore, PageFetcher,
    WatchJob,
};
pub use types::{
    ChangeEvent, ContentType, FetchSource, Frequency, JobRun, Monitor, MonitorMode,
    MonitorStatus, NotificationTarget, Project, Sensitivity, Snapshot, TargetKind,
};
