//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline without launching a browser,
//! touching the network or sending email.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use url::Url;

use crate::config::WatchConfig;
use crate::error::{FetchError, FetchResult, NotifyError, NotifyResult};
use crate::jobs::MemoryJobQueue;
use crate::notify::Notifier;
use crate::pipeline::WatchDeps;
use crate::security::UrlValidator;
use crate::stores::MemoryStore;
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::traits::mailer::{EmailMessage, EmailSender};
use crate::types::FetchSource;

/// A mock fetcher serving predefined HTML by URL.
///
/// Pages can be swapped between runs to simulate a site changing.
pub struct MockFetcher {
    name: &'static str,
    source: FetchSource,
    pages: RwLock<HashMap<String, String>>,
    redirects: RwLock<HashMap<String, String>>,
    failure: RwLock<Option<String>>,
    fetches: AtomicUsize,
    screenshot_requests: AtomicUsize,
}

impl MockFetcher {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            source: FetchSource::Browser,
            pages: RwLock::new(HashMap::new()),
            redirects: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
            fetches: AtomicUsize::new(0),
            screenshot_requests: AtomicUsize::new(0),
        }
    }

    /// Report captures as coming from this strategy.
    pub fn with_source(mut self, source: FetchSource) -> Self {
        self.source = source;
        self
    }

    /// Add a predefined page.
    pub fn with_page(self, url: &Url, html: impl Into<String>) -> Self {
        self.set_page(url, html);
        self
    }

    /// Fail every fetch with the given message.
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.set_failure(Some(message.into()));
        self
    }

    /// Replace the HTML served for a URL.
    pub fn set_page(&self, url: &Url, html: impl Into<String>) {
        self.pages
            .write()
            .unwrap()
            .insert(url.to_string(), html.into());
    }

    /// Report `url` as having landed on `target` after redirects.
    pub fn set_redirect(&self, url: &Url, target: impl Into<String>) {
        self.redirects
            .write()
            .unwrap()
            .insert(url.to_string(), target.into());
    }

    /// Start or stop failing.
    pub fn set_failure(&self, message: Option<String>) {
        *self.failure.write().unwrap() = message;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn screenshot_requests(&self) -> usize {
        self.screenshot_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url, screenshot: bool) -> FetchResult<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if screenshot {
            self.screenshot_requests.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(message) = self.failure.read().unwrap().clone() {
            return Err(FetchError::Browser(message));
        }

        let html = self
            .pages
            .read()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Browser(format!("no mock page for {}", url)))?;

        let final_url = self
            .redirects
            .read()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| url.to_string());

        Ok(FetchedPage {
            html,
            title: Some("Mock Page".to_string()),
            final_url,
            status: Some(200),
            source: self.source,
            screenshot: screenshot.then(|| vec![0x89, b'P', b'N', b'G']),
            started_at: Utc::now(),
            duration_ms: 1,
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A mock mailer that records messages instead of sending them.
#[derive(Default)]
pub struct MockEmailSender {
    sent: RwLock<Vec<EmailMessage>>,
    failure: RwLock<Option<String>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message with the given provider error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.failure.write().unwrap() = Some(message.into());
        self
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        if let Some(body) = self.failure.read().unwrap().clone() {
            return Err(NotifyError::Delivery { status: 500, body });
        }
        self.sent.write().unwrap().push(message.clone());
        Ok(())
    }
}

/// Default validator with the fixture host `example.com` allowed, so runs
/// never depend on DNS.
pub fn test_validator() -> UrlValidator {
    UrlValidator::new().allow_host("example.com")
}

/// In-memory dependencies wired around the given mocks.
pub struct TestDeps {
    pub deps: Arc<WatchDeps>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryJobQueue>,
}

impl TestDeps {
    pub fn new(fetcher: Arc<dyn PageFetcher>, mailer: Arc<dyn EmailSender>) -> Self {
        Self::with_config(fetcher, mailer, WatchConfig::default())
    }

    pub fn with_config(
        fetcher: Arc<dyn PageFetcher>,
        mailer: Arc<dyn EmailSender>,
        config: WatchConfig,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let deps = WatchDeps::builder()
            .store(store.clone())
            .queue(queue.clone())
            .fetcher(fetcher)
            .notifier(Arc::new(Notifier::new(mailer)))
            .validator(test_validator())
            .config(config)
            .build();
        Self {
            deps: Arc::new(deps),
            store,
            queue,
        }
    }
}
