//! End-to-end monitor runs against the in-memory store with mock fetch and
//! mail collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;
use watchtower::analysis::Verdict;
use watchtower::error::{StoreError, StoreResult};
use watchtower::testing::{test_validator, MockEmailSender, MockFetcher, TestDeps};
use watchtower::traits::{MonitorStore, NotificationContext, SuccessUpdate};
use watchtower::{ChangeEvent, JobRun, MemoryJobQueue, MemoryStore, Notifier, Snapshot, WatchDeps};
use watchtower::{
    request_run, resume_monitor, run_monitor, ControlError, Monitor, MonitorMode, MonitorStatus,
    NotificationTarget, Project, RunOutcome, WatchConfig,
};

const URL: &str = "https://example.com/pricing";

struct Harness {
    env: TestDeps,
    fetcher: Arc<MockFetcher>,
    mailer: Arc<MockEmailSender>,
    url: Url,
    project: Project,
}

impl Harness {
    fn new() -> Self {
        Self::build(MockEmailSender::new(), WatchConfig::default())
    }

    fn build(mailer: MockEmailSender, config: WatchConfig) -> Self {
        let url = Url::parse(URL).unwrap();
        let fetcher = Arc::new(MockFetcher::new("mock"));
        let mailer = Arc::new(mailer);
        let env = TestDeps::with_config(fetcher.clone(), mailer.clone(), config);
        let project = Project::builder()
            .name("Acme")
            .owner_email(Some("owner@example.com".to_string()))
            .build();
        env.store.insert_project(project.clone());
        Self {
            env,
            fetcher,
            mailer,
            url,
            project,
        }
    }

    fn add_monitor(&self, configure: impl FnOnce(Monitor) -> Monitor) -> Uuid {
        let monitor = Monitor::builder()
            .project_id(self.project.id)
            .name(Some("Acme pricing".to_string()))
            .url(URL)
            .build();
        let monitor = configure(monitor);
        let id = monitor.id;
        self.env.store.insert_monitor(monitor);
        id
    }

    fn serve(&self, body: &str) {
        self.fetcher
            .set_page(&self.url, format!("<html><body>{}</body></html>", body));
    }

    async fn run(&self, id: Uuid) -> RunOutcome {
        run_monitor(&self.env.deps, id).await.unwrap()
    }

    async fn monitor(&self, id: Uuid) -> Monitor {
        self.env.store.get_monitor(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_first_run_adopts_baseline_without_notifying() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");

    let outcome = h.run(id).await;
    let RunOutcome::Baseline { snapshot_id } = outcome else {
        panic!("expected baseline, got {outcome:?}");
    };

    let monitor = h.monitor(id).await;
    assert_eq!(monitor.last_snapshot_id, Some(snapshot_id));
    assert!(monitor.last_hash.is_some());
    assert!(monitor.last_checked_at.is_some());
    assert!(h.mailer.sent().is_empty());

    let runs = h.env.store.recent_job_runs(id, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].success, Some(true));
    assert!(!runs[0].is_open());
}

#[tokio::test]
async fn test_unchanged_content_still_persists_snapshot() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;

    let outcome = h.run(id).await;
    let RunOutcome::Unchanged { snapshot_id } = outcome else {
        panic!("expected unchanged, got {outcome:?}");
    };
    assert_eq!(h.env.store.snapshot_count(id), 2);
    assert_eq!(h.monitor(id).await.last_snapshot_id, Some(snapshot_id));
    assert!(h.env.store.recent_change_events(id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pricing_change_creates_event_and_notifies_owner() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;

    h.serve("<p>Plan: $12/mo</p>");
    let outcome = h.run(id).await;
    let RunOutcome::Changed {
        event_id, notified, ..
    } = outcome
    else {
        panic!("expected change, got {outcome:?}");
    };
    assert!(notified);

    let events = h.env.store.recent_change_events(id, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.id, event_id);
    assert_eq!(event.summary, "Pricing-related content changed.");
    assert!(event.importance_score >= 10);
    assert!(event.diff_html.contains("<del>$10/mo</del>"));
    assert!(event.diff_html.contains("<ins>$12/mo</ins>"));
    assert!(event.notified_at.is_some());

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["owner@example.com"]);
    assert_eq!(sent[0].subject, "Watchtower: Acme pricing changed");
    assert!(sent[0]
        .text
        .contains(&format!("/monitors/{}#event-{}", id, event_id)));

    let monitor = h.monitor(id).await;
    assert_eq!(monitor.status, MonitorStatus::Active);
    assert_eq!(monitor.consecutive_errors, 0);
}

#[tokio::test]
async fn test_timestamp_churn_is_noise_but_advances_baseline() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Updated 10:01am</p>");
    h.run(id).await;

    h.serve("<p>Updated 10:04am</p>");
    let outcome = h.run(id).await;
    let RunOutcome::Noise {
        snapshot_id,
        verdict,
    } = outcome
    else {
        panic!("expected noise, got {outcome:?}");
    };
    assert_eq!(verdict, Verdict::TimestampOnly);
    assert_eq!(h.monitor(id).await.last_snapshot_id, Some(snapshot_id));
    assert!(h.env.store.recent_change_events(id, 10).await.unwrap().is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_whitespace_only_change_is_not_reported() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Hello world</p>");
    h.run(id).await;

    h.serve("<p>Hello\n\n   world  </p>\n\n");
    let outcome = h.run(id).await;
    assert!(
        matches!(outcome, RunOutcome::Unchanged { .. } | RunOutcome::Noise { .. }),
        "got {outcome:?}"
    );
    assert!(h.env.store.recent_change_events(id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_selector_match_escalates_immediately() {
    let h = Harness::new();
    let id = h.add_monitor(|mut m| {
        m.mode = MonitorMode::Selector;
        m.selector = Some(".missing".to_string());
        m
    });
    h.serve(r#"<div class="price">$10</div>"#);

    let outcome = h.run(id).await;
    let RunOutcome::Failed { error, status } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error, "Selector not found: .missing");
    assert_eq!(status, Some(MonitorStatus::Error));

    let monitor = h.monitor(id).await;
    assert_eq!(monitor.consecutive_errors, 1);
    assert_eq!(monitor.last_error.as_deref(), Some("Selector not found: .missing"));

    let runs = h.env.store.recent_job_runs(id, 10).await.unwrap();
    assert_eq!(runs[0].success, Some(false));
    assert_eq!(runs[0].error.as_deref(), Some("Selector not found: .missing"));
    assert_eq!(h.env.store.snapshot_count(id), 0);
}

#[tokio::test]
async fn test_fetch_failures_pause_after_threshold() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.fetcher.set_failure(Some("net::ERR_CONNECTION_REFUSED".to_string()));

    for expected_errors in 1..=3 {
        let outcome = h.run(id).await;
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                status: Some(MonitorStatus::Active),
                ..
            }
        ));
        assert_eq!(h.monitor(id).await.consecutive_errors, expected_errors);
    }

    let outcome = h.run(id).await;
    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            status: Some(MonitorStatus::Error),
            ..
        }
    ));
    let monitor = h.monitor(id).await;
    assert_eq!(monitor.consecutive_errors, 4);
    assert!(monitor
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("fetch failed:")));
}

#[tokio::test]
async fn test_keyword_overrides_noise_floor() {
    let h = Harness::new();
    let id = h.add_monitor(|mut m| {
        m.keywords = vec!["trial".to_string()];
        m
    });
    h.serve("<p>Our offer</p>");
    h.run(id).await;

    h.serve("<p>Our offer free trial extended</p>");
    let outcome = h.run(id).await;
    assert!(matches!(outcome, RunOutcome::Changed { .. }), "got {outcome:?}");
}

#[tokio::test]
async fn test_notify_failure_is_recorded_without_failing_run() {
    let h = Harness::build(
        MockEmailSender::new().failing("provider down"),
        WatchConfig::default(),
    );
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;

    h.serve("<p>Plan: $12/mo</p>");
    let outcome = h.run(id).await;
    assert!(matches!(
        outcome,
        RunOutcome::Changed {
            notified: false,
            ..
        }
    ));

    let events = h.env.store.recent_change_events(id, 10).await.unwrap();
    assert!(events[0].notified_at.is_none());
    assert!(events[0]
        .notify_error
        .as_deref()
        .is_some_and(|e| e.contains("provider down")));

    let monitor = h.monitor(id).await;
    assert_eq!(monitor.status, MonitorStatus::Active);
    assert_eq!(monitor.consecutive_errors, 0);
    let runs = h.env.store.recent_job_runs(id, 1).await.unwrap();
    assert_eq!(runs[0].success, Some(true));
}

#[tokio::test]
async fn test_enabled_targets_take_precedence_over_owner() {
    let h = Harness::new();
    h.env.store.insert_target(
        NotificationTarget::builder()
            .project_id(h.project.id)
            .value("alerts@example.com")
            .build(),
    );
    h.env.store.insert_target(
        NotificationTarget::builder()
            .project_id(h.project.id)
            .value("muted@example.com")
            .enabled(false)
            .build(),
    );
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;
    h.serve("<p>Plan: $12/mo</p>");
    h.run(id).await;

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["alerts@example.com"]);
}

#[tokio::test]
async fn test_no_recipients_leaves_event_unnotified() {
    let h = Harness::new();
    let orphan = Project::builder().name("No owner").build();
    h.env.store.insert_project(orphan.clone());
    let id = h.add_monitor(|mut m| {
        m.project_id = orphan.id;
        m
    });
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;
    h.serve("<p>Plan: $12/mo</p>");

    let outcome = h.run(id).await;
    assert!(matches!(
        outcome,
        RunOutcome::Changed {
            notified: false,
            ..
        }
    ));
    let events = h.env.store.recent_change_events(id, 10).await.unwrap();
    assert!(events[0].notified_at.is_none());
    assert!(events[0].notify_error.is_none());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_paused_monitor_is_skipped_without_fetching() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.env.store.set_status(id, MonitorStatus::Paused);
    h.serve("<p>Plan: $10/mo</p>");

    let outcome = h.run(id).await;
    assert_eq!(
        outcome,
        RunOutcome::Skipped {
            status: MonitorStatus::Paused
        }
    );
    assert_eq!(h.fetcher.fetch_count(), 0);
    let runs = h.env.store.recent_job_runs(id, 1).await.unwrap();
    assert_eq!(runs[0].success, Some(true));
}

#[tokio::test]
async fn test_pruned_previous_snapshot_resets_baseline() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;

    let previous = h.monitor(id).await.last_snapshot_id.unwrap();
    h.env.store.delete_snapshot(previous);
    h.serve("<p>Plan: $12/mo</p>");

    let outcome = h.run(id).await;
    assert!(matches!(outcome, RunOutcome::Baseline { .. }), "got {outcome:?}");
    assert!(h.env.store.recent_change_events(id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_monitor_is_recorded_as_failed_run() {
    let h = Harness::new();
    let id = Uuid::new_v4();

    let outcome = h.run(id).await;
    assert!(matches!(outcome, RunOutcome::Failed { status: None, .. }));
    let runs = h.env.store.recent_job_runs(id, 1).await.unwrap();
    assert_eq!(runs[0].success, Some(false));
}

#[tokio::test]
async fn test_blocked_url_fails_without_fetching() {
    let h = Harness::new();
    let id = h.add_monitor(|mut m| {
        m.url = "http://169.254.169.254/latest/meta-data".to_string();
        m
    });

    let outcome = h.run(id).await;
    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(h.fetcher.fetch_count(), 0);
    assert_eq!(h.monitor(id).await.consecutive_errors, 1);
}

#[tokio::test]
async fn test_redirect_into_blocked_address_fails_run() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.serve("<p>metadata</p>");
    h.fetcher
        .set_redirect(&h.url, "http://169.254.169.254/latest/meta-data");

    let outcome = h.run(id).await;
    assert!(
        matches!(&outcome, RunOutcome::Failed { error, .. } if error.contains("169.254.169.254")),
        "got {outcome:?}"
    );
    assert!(h.env.store.recent_snapshots(id, 10).await.unwrap().is_empty());
    assert_eq!(h.monitor(id).await.consecutive_errors, 1);
}

#[tokio::test]
async fn test_snapshot_records_metadata_and_optional_screenshot() {
    let mut config = WatchConfig::default();
    config.fetch.capture_screenshots = true;
    let h = Harness::build(MockEmailSender::new(), config);
    let id = h.add_monitor(|m| m);
    h.serve("<p>Plan: $10/mo</p>");
    h.run(id).await;

    assert_eq!(h.fetcher.screenshot_requests(), 1);
    let snapshot = h.env.store.recent_snapshots(id, 1).await.unwrap().remove(0);
    assert!(snapshot.screenshot.is_some());
    assert_eq!(snapshot.screenshot_mime.as_deref(), Some("image/png"));
    assert_eq!(snapshot.http_status, Some(200));
    assert_eq!(snapshot.content, "Plan: $10/mo");
    assert_eq!(snapshot.raw_meta["title"], "Mock Page");
    assert_eq!(snapshot.raw_meta["finalUrl"], URL);
    assert_eq!(snapshot.raw_meta["strategy"], "BROWSER");
}

#[tokio::test]
async fn test_manual_run_requires_active_and_resume_reactivates() {
    let h = Harness::new();
    let id = h.add_monitor(|m| m);
    h.env.store.set_status(id, MonitorStatus::Error);

    let err = request_run(&h.env.deps, id).await.unwrap_err();
    assert!(matches!(err, ControlError::NotActive(MonitorStatus::Error)));
    assert_eq!(h.env.queue.pending_count(), 0);

    resume_monitor(&h.env.deps, id).await.unwrap();
    let monitor = h.monitor(id).await;
    assert_eq!(monitor.status, MonitorStatus::Active);
    assert_eq!(monitor.consecutive_errors, 0);

    assert!(request_run(&h.env.deps, id).await.unwrap().is_created());
    assert_eq!(h.env.queue.pending_count(), 1);

    let missing = resume_monitor(&h.env.deps, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, ControlError::NotFound(_)));
}

/// Memory store whose recipient lookup fails a set number of times.
struct RecipientOutageStore {
    inner: Arc<MemoryStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl MonitorStore for RecipientOutageStore {
    async fn start_run(&self, monitor_id: Uuid) -> StoreResult<JobRun> {
        self.inner.start_run(monitor_id).await
    }

    async fn finish_run(&self, run_id: Uuid, success: bool, error: Option<&str>) -> StoreResult<()> {
        self.inner.finish_run(run_id, success, error).await
    }

    async fn get_monitor(&self, id: Uuid) -> StoreResult<Option<Monitor>> {
        self.inner.get_monitor(id).await
    }

    async fn record_success(&self, monitor_id: Uuid, update: &SuccessUpdate) -> StoreResult<()> {
        self.inner.record_success(monitor_id, update).await
    }

    async fn record_failure(
        &self,
        monitor_id: Uuid,
        error: &str,
        escalate: bool,
        threshold: i32,
    ) -> StoreResult<Option<MonitorStatus>> {
        self.inner
            .record_failure(monitor_id, error, escalate, threshold)
            .await
    }

    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>> {
        self.inner.find_due(now).await
    }

    async fn claim_due(
        &self,
        monitor_id: Uuid,
        now: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.claim_due(monitor_id, now, next).await
    }

    async fn resume(&self, monitor_id: Uuid) -> StoreResult<bool> {
        self.inner.resume(monitor_id).await
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        self.inner.insert_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>> {
        self.inner.get_snapshot(id).await
    }

    async fn recent_snapshots(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<Snapshot>> {
        self.inner.recent_snapshots(monitor_id, limit).await
    }

    async fn insert_change_event(&self, event: &ChangeEvent) -> StoreResult<()> {
        self.inner.insert_change_event(event).await
    }

    async fn mark_notified(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_notified(event_id, at).await
    }

    async fn mark_notify_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        self.inner.mark_notify_failed(event_id, error).await
    }

    async fn recent_change_events(
        &self,
        monitor_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ChangeEvent>> {
        self.inner.recent_change_events(monitor_id, limit).await
    }

    async fn recent_job_runs(&self, monitor_id: Uuid, limit: i64) -> StoreResult<Vec<JobRun>> {
        self.inner.recent_job_runs(monitor_id, limit).await
    }

    async fn notification_context(&self, project_id: Uuid) -> StoreResult<NotificationContext> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Corrupt("recipients lookup down".to_string()));
        }
        self.inner.notification_context(project_id).await
    }
}

#[tokio::test]
async fn test_recipient_lookup_failure_records_change_once() {
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(RecipientOutageStore {
        inner: memory.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let fetcher = Arc::new(MockFetcher::new("mock"));
    let mailer = Arc::new(MockEmailSender::new());
    let deps = WatchDeps::builder()
        .store(store)
        .queue(Arc::new(MemoryJobQueue::new()))
        .fetcher(fetcher.clone())
        .notifier(Arc::new(Notifier::new(mailer.clone())))
        .validator(test_validator())
        .build();

    let project = Project::builder()
        .name("Acme")
        .owner_email(Some("owner@example.com".to_string()))
        .build();
    memory.insert_project(project.clone());
    let monitor = Monitor::builder()
        .project_id(project.id)
        .name(Some("Acme pricing".to_string()))
        .url(URL)
        .build();
    let id = monitor.id;
    memory.insert_monitor(monitor);
    let url = Url::parse(URL).unwrap();

    fetcher.set_page(&url, "<html><body><p>Plan: $10/mo</p></body></html>");
    run_monitor(&deps, id).await.unwrap();

    fetcher.set_page(&url, "<html><body><p>Plan: $12/mo</p></body></html>");
    let first = run_monitor(&deps, id).await.unwrap();
    assert!(
        matches!(first, RunOutcome::Changed { notified: false, .. }),
        "got {first:?}"
    );

    let second = run_monitor(&deps, id).await.unwrap();
    assert!(matches!(second, RunOutcome::Unchanged { .. }), "got {second:?}");

    let events = memory.recent_change_events(id, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].notified_at.is_none());
    assert!(events[0]
        .notify_error
        .as_deref()
        .is_some_and(|e| e.contains("recipients lookup down")));
    assert!(mailer.sent().is_empty());

    let monitor = memory.get_monitor(id).await.unwrap().unwrap();
    assert_eq!(monitor.status, MonitorStatus::Active);
    assert_eq!(monitor.consecutive_errors, 0);
}
