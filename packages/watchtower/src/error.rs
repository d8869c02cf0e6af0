//! Typed errors for the watchtower library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the orchestrator can
//! decide escalation from the error kind rather than from message text.

use thiserror::Error;
use uuid::Uuid;

use crate::types::MonitorStatus;

/// Security-related errors from URL validation.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("invalid URL: disallowed scheme {0}")]
    DisallowedScheme(String),

    /// URL has no host
    #[error("invalid URL: no host")]
    NoHost,

    /// Host is loopback, link-local, private or internal
    #[error("blocked host: {0}")]
    BlockedHost(String),
}

/// Errors from a single fetch strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Browser launch, navigation or DOM capture failed
    #[error("browser error: {0}")]
    Browser(String),

    /// Navigation exceeded its hard timeout
    #[error("timeout after {seconds}s fetching {url}")]
    Timeout { url: String, seconds: u64 },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Every configured strategy failed
    #[error("all fetch strategies failed: {0}")]
    Exhausted(String),
}

/// Errors from content extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// SELECTOR mode without a selector
    #[error("Selector missing")]
    SelectorMissing,

    /// The selector matched no elements
    #[error("Selector not found: {selector}")]
    SelectorNotFound { selector: String },

    /// The primary selector could not be parsed
    #[error("Selector invalid: {selector}")]
    InvalidSelector { selector: String },
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Monitor does not exist
    #[error("monitor not found: {0}")]
    MonitorNotFound(Uuid),

    /// Backend failure
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// Errors from the job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Job not found
    #[error("job not found: {0}")]
    NotFound(Uuid),

    /// Payload could not be encoded or decoded
    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Backend failure
    #[error("queue error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Backend(Box::new(e))
    }
}

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Mailer is not configured (missing API key or sender)
    #[error("email not configured: {0}")]
    Config(String),

    /// No recipients resolved for the monitor
    #[error("no recipients")]
    NoRecipients,

    /// Provider rejected the message
    #[error("delivery failed ({status}): {body}")]
    Delivery { status: u16, body: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a single monitor run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RunError {
    /// Non-transient configuration errors that pause the monitor on first
    /// occurrence instead of counting toward the error threshold.
    pub fn escalates_immediately(&self) -> bool {
        matches!(self, RunError::Extract(_))
    }
}

impl From<FetchError> for RunError {
    fn from(e: FetchError) -> Self {
        RunError::FetchFailed(e.to_string())
    }
}

/// Errors from the worker runtime.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Cron registration or scheduler start failed
    #[error("scheduler error: {0}")]
    Schedule(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors from manual monitor controls.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("monitor not found: {0}")]
    NotFound(Uuid),

    /// Manual runs require an ACTIVE monitor
    #[error("monitor is {}; resume it first", .0.as_str())]
    NotActive(MonitorStatus),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for extraction.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Result type alias for notification delivery.
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_errors_escalate() {
        let err = RunError::from(ExtractError::SelectorNotFound {
            selector: ".missing".into(),
        });
        assert!(err.escalates_immediately());
        assert_eq!(err.to_string(), "Selector not found: .missing");
    }

    #[test]
    fn test_fetch_errors_do_not_escalate() {
        let err = RunError::from(FetchError::Exhausted("connection refused".into()));
        assert!(!err.escalates_immediately());
        assert!(err.to_string().starts_with("fetch failed:"));
    }
}
