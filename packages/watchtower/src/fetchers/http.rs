//! Plain HTTP fetcher used as the fallback strategy.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchResult;
use crate::security::UrlValidator;
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::types::FetchSource;

const MAX_REDIRECTS: usize = 10;

/// Fetches raw HTML with a browser-like user agent. No rendering, no
/// screenshots. Non-2xx responses are still returned so the page body is
/// captured as-is. Every redirect hop is re-checked by the URL validator.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig, validator: UrlValidator) -> FetchResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(redirect_policy(validator))
            .build()?;

        Ok(Self { client })
    }

    /// Use an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, _screenshot: bool) -> FetchResult<FetchedPage> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let html = response.text().await?;

        debug!(url = %url, status, bytes = html.len(), "fetched page over HTTP");

        Ok(FetchedPage {
            title: title_of(&html),
            html,
            final_url,
            status: Some(status),
            source: FetchSource::HttpFallback,
            screenshot: None,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn redirect_policy(validator: UrlValidator) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        match validator.validate(attempt.url().as_str()) {
            Ok(_) => attempt.follow(),
            Err(e) => {
                debug!(url = %attempt.url(), error = %e, "refusing redirect");
                attempt.error(e)
            }
        }
    })
}

fn title_of(html: &str) -> Option<String> {
    let doc = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("title").ok()?;
    let title = doc
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}
