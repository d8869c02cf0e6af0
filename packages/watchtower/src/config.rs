//! Runtime configuration for the pipeline, fetchers, classifier and worker.

use std::time::Duration;

use uuid::Uuid;

/// Default browser-like user agent for both fetch strategies.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Top-level configuration shared by every pipeline component.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub fetch: FetchConfig,
    pub classifier: ClassifierConfig,
    pub worker: WorkerConfig,
    /// Consecutive failures tolerated before a monitor moves to ERROR
    pub error_threshold: i32,
    /// Total characters of before/after context in notifications
    pub snippet_limit: usize,
    /// Base URL used for links back to the dashboard
    pub app_url: String,
    /// Cron expression (with seconds) for the recurring scheduler tick
    pub scheduler_cron: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            worker: WorkerConfig::default(),
            error_threshold: 3,
            snippet_limit: 800,
            app_url: "http://localhost:3000".to_string(),
            scheduler_cron: "0 */10 * * * *".to_string(),
        }
    }
}

/// Fetch strategy settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Hard timeout for browser navigation
    pub navigation_timeout: Duration,
    /// Best-effort wait for the network to settle after load
    pub settle_timeout: Duration,
    /// Timeout for the plain HTTP fallback
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Capture a full-page PNG alongside the HTML
    pub capture_screenshots: bool,
    /// Explicit Chrome/Chromium binary, otherwise auto-detected
    pub chrome_executable: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            settle_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            capture_screenshots: false,
            chrome_executable: None,
        }
    }
}

/// Thresholds for the meaningful-change classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Changes with fewer changed characters are noise
    pub min_changed_chars: usize,
    /// Pages longer than this use the ratio test
    pub large_page_chars: usize,
    /// Minimum changed/previous ratio on large pages
    pub min_change_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_changed_chars: 40,
            large_page_chars: 2000,
            min_change_ratio: 0.005,
        }
    }
}

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// How long `stop()` waits for in-flight jobs
    pub shutdown_grace: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
    /// Register the recurring scheduler tick
    pub enable_schedule: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(60),
            worker_id: format!("worker-{}", Uuid::new_v4()),
            enable_schedule: true,
        }
    }
}

impl WorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}
