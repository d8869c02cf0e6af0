//! Process wiring for the watchtower worker.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use watchtower::{
    FallbackFetcher, Notifier, PostgresJobQueue, PostgresStore, ResendMailer, UrlValidator,
    WatchDeps,
};

pub use config::Config;

/// Connect to the database.
pub async fn connect(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

/// Build the service context shared by every entry point.
pub fn build_deps(config: &Config, pool: PgPool) -> Result<WatchDeps> {
    let watch = config.watch_config();

    let validator = UrlValidator::default();
    let fetcher = FallbackFetcher::standard(&watch.fetch, validator.clone())
        .context("Failed to build page fetchers")?;
    tracing::info!(strategies = ?fetcher.strategy_names(), "fetch strategies ready");

    let mailer = ResendMailer::new(config.resend_api_key.clone(), config.from_email.clone());
    if !mailer.is_configured() {
        tracing::warn!("RESEND_API_KEY or FROM_EMAIL not set; change emails will fail");
    }

    Ok(WatchDeps::builder()
        .store(Arc::new(PostgresStore::new(pool.clone())))
        .queue(Arc::new(PostgresJobQueue::new(pool)))
        .fetcher(Arc::new(fetcher))
        .notifier(Arc::new(Notifier::new(Arc::new(mailer))))
        .validator(validator)
        .config(watch)
        .build())
}
