//! Seams between the pipeline and its collaborators.
//!
//! - [`PageFetcher`]: browser or plain HTTP retrieval
//! - [`MonitorStore`]: durable monitor/snapshot/event/ledger storage
//! - [`JobQueue`]: durable at-least-once job queue
//! - [`EmailSender`]: outbound email delivery

pub mod fetcher;
pub mod mailer;
pub mod queue;
pub mod store;

pub use fetcher::{FetchedPage, PageFetcher};
pub use mailer::{EmailMessage, EmailSender};
pub use queue::{ClaimedJob, EnqueueResult, JobQueue, WatchJob};
pub use store::{MonitorStore, NotificationContext, SuccessUpdate};
