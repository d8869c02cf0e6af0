use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

use watchtower::WatchConfig;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub resend_api_key: Option<String>,
    pub from_email: Option<String>,
    pub scheduler_cron: String,
    pub capture_screenshots: bool,
    pub chrome_executable: Option<String>,
    pub worker_batch_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let provider = env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "resend".to_string());
        if !provider.eq_ignore_ascii_case("resend") {
            bail!("Unsupported email provider: {}", provider);
        }

        let defaults = WatchConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            app_url: env::var("APP_URL").unwrap_or(defaults.app_url),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            from_email: env::var("FROM_EMAIL").ok(),
            scheduler_cron: env::var("SCHEDULER_CRON").unwrap_or(defaults.scheduler_cron),
            capture_screenshots: env::var("CAPTURE_SCREENSHOTS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            chrome_executable: env::var("CHROME_EXECUTABLE").ok(),
            worker_batch_size: env::var("WORKER_BATCH_SIZE")
                .unwrap_or_else(|_| defaults.worker.batch_size.to_string())
                .parse()
                .context("WORKER_BATCH_SIZE must be a valid number")?,
        })
    }

    /// Pipeline configuration with environment overrides applied.
    pub fn watch_config(&self) -> WatchConfig {
        let mut config = WatchConfig::default();
        config.app_url = self.app_url.clone();
        config.scheduler_cron = self.scheduler_cron.clone();
        config.fetch.capture_screenshots = self.capture_screenshots;
        config.fetch.chrome_executable = self.chrome_executable.clone();
        config.worker.batch_size = self.worker_batch_size;
        config
    }
}
