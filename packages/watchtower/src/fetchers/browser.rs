//! Headless Chromium fetcher.
//!
//! Each fetch launches an isolated browser, so no cookies or cache leak
//! between monitors. The browser is owned by a [`BrowserSession`] guard that
//! closes it on every exit path: explicit `close()` on the normal path, a
//! spawned close from `Drop` on early returns and timeouts.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetBlockedUrLsParams,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, EventLifecycleEvent};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::types::FetchSource;

/// URL patterns for images, media and fonts, blocked unless a screenshot is
/// requested.
const HEAVY_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico", "*.mp4",
    "*.webm", "*.mp3", "*.ogg", "*.wav", "*.woff", "*.woff2", "*.ttf", "*.otf", "*.eot",
];

/// Fetches the rendered DOM with headless Chromium.
pub struct BrowserFetcher {
    config: FetchConfig,
}

impl BrowserFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> FetchResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .request_timeout(self.config.navigation_timeout);
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(FetchError::Browser)
    }

    async fn render(
        &self,
        page: &Page,
        url: &Url,
        screenshot: bool,
    ) -> FetchResult<Rendered> {
        page.set_user_agent(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
            .await
            .map_err(browser_err)?;
        page.execute(EnableParams::default())
            .await
            .map_err(browser_err)?;
        if !screenshot {
            let patterns = HEAVY_RESOURCE_PATTERNS.iter().map(|p| p.to_string()).collect();
            if let Err(e) = page.execute(SetBlockedUrLsParams::new(patterns)).await {
                debug!(error = %e, "resource blocking unavailable");
            }
        }

        let status_rx = watch_document_status(page).await;
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(browser_err)?;

        let timeout = self.config.navigation_timeout;
        tokio::time::timeout(timeout, page.goto(url.as_str()))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            })?
            .map_err(browser_err)?;

        let settled = tokio::time::timeout(self.config.settle_timeout, async {
            while let Some(event) = lifecycle.next().await {
                if event.name == "networkIdle" {
                    break;
                }
            }
        })
        .await;
        if settled.is_err() {
            debug!(url = %url, "network did not settle, continuing");
        }

        let html = page.content().await.map_err(browser_err)?;
        let title = page.get_title().await.map_err(browser_err)?;
        let final_url = page
            .url()
            .await
            .map_err(browser_err)?
            .unwrap_or_else(|| url.to_string());

        let status = match status_rx {
            Some(rx) => tokio::time::timeout(Duration::from_millis(250), rx)
                .await
                .ok()
                .and_then(Result::ok),
            None => None,
        };

        let image = if screenshot {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            match page.screenshot(params).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(url = %url, error = %e, "screenshot failed, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        Ok(Rendered {
            html,
            title,
            final_url,
            status,
            screenshot: image,
        })
    }
}

struct Rendered {
    html: String,
    title: Option<String>,
    final_url: String,
    status: Option<u16>,
    screenshot: Option<Vec<u8>>,
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url, screenshot: bool) -> FetchResult<FetchedPage> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let session = BrowserSession::launch(self.browser_config()?).await?;
        let page = session
            .browser()?
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        let rendered = self.render(&page, url, screenshot).await;
        session.close().await;
        let rendered = rendered?;

        debug!(
            url = %url,
            final_url = %rendered.final_url,
            status = ?rendered.status,
            bytes = rendered.html.len(),
            "rendered page in browser"
        );

        Ok(FetchedPage {
            html: rendered.html,
            title: rendered.title,
            final_url: rendered.final_url,
            status: rendered.status,
            source: FetchSource::Browser,
            screenshot: rendered.screenshot,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

fn browser_err(e: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// Resolve with the status of the first Document response seen.
async fn watch_document_status(page: &Page) -> Option<oneshot::Receiver<u16>> {
    let mut responses = match page.event_listener::<EventResponseReceived>().await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, "cannot observe responses, status unavailable");
            return None;
        }
    };
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            if event.r#type == ResourceType::Document {
                let _ = tx.send(event.response.status as u16);
                return;
            }
        }
    });
    Some(rx)
}

/// Owns a launched browser and its CDP handler task.
struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    runtime: tokio::runtime::Handle,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> FetchResult<Self> {
        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            runtime: tokio::runtime::Handle::current(),
        })
    }

    fn browser(&self) -> FetchResult<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser session already closed".into()))
    }

    /// Close the browser and stop the handler.
    async fn close(mut self) {
        if let Some(browser) = self.browser.take() {
            shutdown(browser).await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let browser = self.browser.take();
        let handler = self.handler.take();
        if browser.is_none() && handler.is_none() {
            return;
        }
        self.runtime.spawn(async move {
            if let Some(browser) = browser {
                shutdown(browser).await;
            }
            if let Some(handler) = handler {
                handler.abort();
            }
        });
    }
}

async fn shutdown(mut browser: Browser) {
    if let Err(e) = browser.close().await {
        warn!(error = %e, "browser close failed");
    }
    if let Err(e) = browser.wait().await {
        debug!(error = %e, "browser wait failed");
    }
}
