//! PostgreSQL store and queue against a throwaway container.
//!
//! Requires Docker. Run with:
//! `cargo test -p watchtower --features postgres -- --ignored`

#![cfg(feature = "postgres")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use url::Url;
use watchtower::testing::{test_validator, MockEmailSender, MockFetcher};
use watchtower::traits::{JobQueue, MonitorStore, SuccessUpdate};
use watchtower::{
    run_monitor, run_scheduler, Monitor, MonitorStatus, NotificationTarget, Notifier,
    PostgresJobQueue, PostgresStore, Project, RunOutcome, WatchDeps, WatchJob,
};

/// Containers are started once and shared by every test in this file.
struct SharedInfra {
    db_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedInfra> = OnceCell::const_new();

async fn infra() -> &'static SharedInfra {
    SHARED_INFRA
        .get_or_init(|| async {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();

            let postgres = Postgres::default()
                .with_tag("16")
                .start()
                .await
                .expect("Failed to start Postgres container");
            let host = postgres.get_host().await.expect("container host");
            let port = postgres
                .get_host_port_ipv4(5432)
                .await
                .expect("container port");
            let db_url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&db_url).await.expect("connect for migrations");
            PostgresStore::new(pool)
                .migrate()
                .await
                .expect("Failed to run migrations");

            SharedInfra {
                db_url,
                _postgres: postgres,
            }
        })
        .await
}

async fn store() -> PostgresStore {
    let pool = PgPool::connect(&infra().await.db_url)
        .await
        .expect("connect");
    PostgresStore::new(pool)
}

async fn seeded_monitor(store: &PostgresStore) -> Monitor {
    let project = Project::builder()
        .name("Acme")
        .owner_email(Some("owner@example.com".to_string()))
        .build();
    store.insert_project(&project).await.unwrap();
    let monitor = Monitor::builder()
        .project_id(project.id)
        .url("https://example.com/pricing")
        .keywords(vec!["trial".to_string()])
        .next_due_at(Utc::now() - Duration::minutes(5))
        .build();
    store.insert_monitor(&monitor).await.unwrap();
    monitor
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_monitor_round_trip_and_claim() {
    let store = store().await;
    let monitor = seeded_monitor(&store).await;

    let loaded = store.get_monitor(monitor.id).await.unwrap().unwrap();
    assert_eq!(loaded.url, monitor.url);
    assert_eq!(loaded.keywords, vec!["trial"]);
    assert_eq!(loaded.status, MonitorStatus::Active);

    let now = Utc::now();
    let next = now + Duration::days(1);
    assert!(store.claim_due(monitor.id, now, next).await.unwrap());
    assert!(!store.claim_due(monitor.id, now, next).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failure_counter_and_pause_preserving_success() {
    let store = store().await;
    let monitor = seeded_monitor(&store).await;

    for _ in 0..3 {
        let status = store
            .record_failure(monitor.id, "timeout", false, 3)
            .await
            .unwrap();
        assert_eq!(status, Some(MonitorStatus::Active));
    }
    let status = store
        .record_failure(monitor.id, "timeout", false, 3)
        .await
        .unwrap();
    assert_eq!(status, Some(MonitorStatus::Error));

    assert!(store.resume(monitor.id).await.unwrap());
    store.set_status(monitor.id, MonitorStatus::Paused).await.unwrap();
    store
        .record_success(
            monitor.id,
            &SuccessUpdate {
                last_hash: "abc".into(),
                last_snapshot_id: uuid::Uuid::new_v4(),
                checked_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    let loaded = store.get_monitor(monitor.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, MonitorStatus::Paused);
    assert_eq!(loaded.consecutive_errors, 0);

    let missing = store
        .record_failure(uuid::Uuid::new_v4(), "gone", false, 3)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_queue_idempotency_and_retry() {
    let store = store().await;
    let queue = PostgresJobQueue::new(store.pool().clone());

    let first = queue.enqueue(WatchJob::Scheduler).await.unwrap();
    let second = queue.enqueue(WatchJob::Scheduler).await.unwrap();
    assert_eq!(second.job_id(), first.job_id());
    assert!(!second.is_created());

    let claimed = queue.claim("worker-a", 10).await.unwrap();
    let tick = claimed
        .iter()
        .find(|j| j.id == first.job_id())
        .expect("scheduler tick claimed");
    assert_eq!(tick.attempt, 1);
    queue.mark_succeeded(tick.id).await.unwrap();
    assert!(queue.enqueue(WatchJob::Scheduler).await.unwrap().is_created());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pipeline_against_postgres() {
    let store = Arc::new(store().await);
    let monitor = seeded_monitor(&store).await;
    store
        .insert_target(
            &NotificationTarget::builder()
                .project_id(monitor.project_id)
                .value("alerts@example.com")
                .build(),
        )
        .await
        .unwrap();

    let url = Url::parse(&monitor.url).unwrap();
    let fetcher = Arc::new(MockFetcher::new("mock").with_page(&url, "<body><p>Our offer</p></body>"));
    let mailer = Arc::new(MockEmailSender::new());
    let deps = WatchDeps::builder()
        .store(store.clone())
        .queue(Arc::new(PostgresJobQueue::new(store.pool().clone())))
        .fetcher(fetcher.clone())
        .notifier(Arc::new(Notifier::new(mailer.clone())))
        .validator(test_validator())
        .build();

    let report = run_scheduler(&deps).await.unwrap();
    assert!(report.enqueued >= 1);

    assert!(matches!(
        run_monitor(&deps, monitor.id).await.unwrap(),
        RunOutcome::Baseline { .. }
    ));
    fetcher.set_page(&url, "<body><p>Our offer free trial extended</p></body>");
    assert!(matches!(
        run_monitor(&deps, monitor.id).await.unwrap(),
        RunOutcome::Changed { notified: true, .. }
    ));

    let events = store.recent_change_events(monitor.id, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].notified_at.is_some());
    assert_eq!(mailer.sent()[0].to, vec!["alerts@example.com"]);

    let runs = store.recent_job_runs(monitor.id, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.success == Some(true)));
}
