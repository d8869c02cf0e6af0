// Main entry point for the watchtower worker

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use watchtower::{request_run, resume_monitor, run_scheduler, start_worker, PostgresStore};
use worker_core::{build_deps, connect, Config};

#[derive(Parser)]
#[command(name = "watchtower-worker")]
#[command(about = "Web page change monitor worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the job queue and register the recurring scheduler tick
    Start {
        /// Skip the cron registration (another process owns it)
        #[arg(long)]
        no_schedule: bool,
    },

    /// Run one scheduler pass and exit
    Tick,

    /// Enqueue an immediate run for a monitor
    Run { monitor_id: Uuid },

    /// Reactivate a paused or errored monitor
    Resume { monitor_id: Uuid },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,watchtower=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = connect(&config).await?;

    match cli.command {
        Commands::Migrate => {
            tracing::info!("Running database migrations...");
            PostgresStore::new(pool)
                .migrate()
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");
        }
        Commands::Tick => {
            let deps = build_deps(&config, pool)?;
            let report = run_scheduler(&deps).await.context("Scheduler tick failed")?;
            tracing::info!(
                due = report.due,
                enqueued = report.enqueued,
                "Scheduler tick finished"
            );
        }
        Commands::Run { monitor_id } => {
            let deps = build_deps(&config, pool)?;
            let result = request_run(&deps, monitor_id)
                .await
                .context("Failed to request run")?;
            tracing::info!(job_id = %result.job_id(), "Run enqueued");
        }
        Commands::Resume { monitor_id } => {
            let deps = build_deps(&config, pool)?;
            resume_monitor(&deps, monitor_id)
                .await
                .context("Failed to resume monitor")?;
            tracing::info!(monitor_id = %monitor_id, "Monitor resumed");
        }
        Commands::Start { no_schedule } => {
            let mut deps = build_deps(&config, pool)?;
            deps.config.worker.enable_schedule = !no_schedule;

            let handle = start_worker(Arc::new(deps))
                .await
                .context("Failed to start worker")?;
            tracing::info!("Watchtower worker started");

            shutdown_signal().await;
            tracing::info!("Shutting down worker...");
            handle.stop().await.context("Worker did not stop cleanly")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
