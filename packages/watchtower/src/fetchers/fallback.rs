//! Ordered fallback over several fetch strategies.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::security::UrlValidator;
use crate::traits::fetcher::{FetchedPage, PageFetcher};

/// Tries each strategy in order and returns the first success.
///
/// When every strategy fails the error carries each strategy's message.
pub struct FallbackFetcher {
    strategies: Vec<Arc<dyn PageFetcher>>,
}

impl FallbackFetcher {
    pub fn new(strategies: Vec<Arc<dyn PageFetcher>>) -> Self {
        Self { strategies }
    }

    /// Browser first (when compiled in), then plain HTTP. The validator
    /// guards the HTTP strategy's redirects.
    pub fn standard(config: &FetchConfig, validator: UrlValidator) -> FetchResult<Self> {
        let mut strategies: Vec<Arc<dyn PageFetcher>> = Vec::new();
        #[cfg(feature = "browser")]
        strategies.push(Arc::new(super::BrowserFetcher::new(config.clone())));
        strategies.push(Arc::new(super::HttpFetcher::new(config, validator)?));
        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl PageFetcher for FallbackFetcher {
    async fn fetch(&self, url: &Url, screenshot: bool) -> FetchResult<FetchedPage> {
        let mut failures = Vec::new();

        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.fetch(url, screenshot).await {
                Ok(page) => {
                    if i > 0 {
                        info!(url = %url, strategy = strategy.name(), "fetched with fallback strategy");
                    }
                    return Ok(page);
                }
                Err(e) => {
                    warn!(
                        url = %url,
                        strategy = strategy.name(),
                        error = %e,
                        "fetch strategy failed"
                    );
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(FetchError::Exhausted(if failures.is_empty() {
            "no fetch strategies configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use crate::types::FetchSource;

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Arc::new(MockFetcher::new("browser").with_page(&url(), "<p>rendered</p>"));
        let secondary = Arc::new(MockFetcher::new("http").with_page(&url(), "<p>raw</p>"));
        let fetcher = FallbackFetcher::new(vec![primary.clone(), secondary.clone()]);

        let page = fetcher.fetch(&url(), false).await.unwrap();
        assert_eq!(page.html, "<p>rendered</p>");
        assert_eq!(secondary.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_failure() {
        let primary = Arc::new(MockFetcher::new("browser").failing("chrome not found"));
        let secondary = Arc::new(
            MockFetcher::new("http")
                .with_source(FetchSource::HttpFallback)
                .with_page(&url(), "<p>raw</p>"),
        );
        let fetcher = FallbackFetcher::new(vec![primary.clone(), secondary.clone()]);

        let page = fetcher.fetch(&url(), true).await.unwrap();
        assert_eq!(page.source, FetchSource::HttpFallback);
        assert_eq!(primary.fetch_count(), 1);
        assert_eq!(secondary.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_reports_every_strategy() {
        let fetcher = FallbackFetcher::new(vec![
            Arc::new(MockFetcher::new("browser").failing("crashed")),
            Arc::new(MockFetcher::new("http").failing("connection refused")),
        ]);

        let err = fetcher.fetch(&url(), false).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("browser"));
        assert!(message.contains("connection refused"));
    }
}
