//! Per-monitor pipeline with bookkeeping and error escalation.
//!
//! ```text
//! STARTED ─► FETCHED ─► EXTRACTED ─► NORMALIZED ─► HASHED
//!     HASHED ─► NO_BASELINE | UNCHANGED | CHANGED
//!     CHANGED ─► CLASSIFIED ─► NOISE | NOTIFIABLE
//!     NOTIFIABLE ─► NOTIFIED | NOTIFY_FAILED
//! any failure before HASHED ─► FAILED
//! ```

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::deps::WatchDeps;
use crate::analysis::{classify, score_importance, summarize, ChangeInput, Verdict};
use crate::content::{content_hash, extract, normalize};
use crate::diff::diff_words;
use crate::error::{RunError, StoreError, StoreResult};
use crate::notify::{resolve_recipients, ChangeEmail};
use crate::traits::store::SuccessUpdate;
use crate::types::{ChangeEvent, Monitor, MonitorStatus, Snapshot};

const SCREENSHOT_MIME: &str = "image/png";

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Monitor was not ACTIVE when the run started
    Skipped { status: MonitorStatus },
    /// First capture, or the previous one is gone
    Baseline { snapshot_id: Uuid },
    /// Same hash as the previous capture
    Unchanged { snapshot_id: Uuid },
    /// Content changed but the classifier filtered it
    Noise { snapshot_id: Uuid, verdict: Verdict },
    /// Meaningful change recorded
    Changed {
        snapshot_id: Uuid,
        event_id: Uuid,
        /// At least one recipient accepted the alert
        notified: bool,
    },
    /// Run failed; the monitor's status after escalation, if it still exists
    Failed {
        error: String,
        status: Option<MonitorStatus>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }
}

/// Run the pipeline for one monitor.
///
/// Every run-level failure is caught here, written to the ledger and
/// reflected on the monitor. Only a ledger write failure is returned as an
/// error. Safe to call concurrently for the same monitor; the last
/// bookkeeping write wins.
#[instrument(skip_all, fields(monitor_id = %monitor_id))]
pub async fn run_monitor(deps: &WatchDeps, monitor_id: Uuid) -> StoreResult<RunOutcome> {
    let run = deps.store.start_run(monitor_id).await?;

    match execute(deps, monitor_id).await {
        Ok(outcome) => {
            deps.store.finish_run(run.id, true, None).await?;
            info!(outcome = ?outcome, "monitor run finished");
            Ok(outcome)
        }
        Err(e) => {
            let message = e.to_string();
            let status = match deps
                .store
                .record_failure(
                    monitor_id,
                    &message,
                    e.escalates_immediately(),
                    deps.config.error_threshold,
                )
                .await
            {
                Ok(status) => status,
                Err(store_err) => {
                    warn!(error = %store_err, "failed to record monitor failure");
                    None
                }
            };
            deps.store.finish_run(run.id, false, Some(&message)).await?;

            if status == Some(MonitorStatus::Error) {
                warn!(error = %message, "monitor moved to ERROR");
            } else {
                warn!(error = %message, "monitor run failed");
            }
            Ok(RunOutcome::Failed {
                error: message,
                status,
            })
        }
    }
}

async fn execute(deps: &WatchDeps, monitor_id: Uuid) -> Result<RunOutcome, RunError> {
    let monitor = deps
        .store
        .get_monitor(monitor_id)
        .await?
        .ok_or(StoreError::MonitorNotFound(monitor_id))?;

    if monitor.status != MonitorStatus::Active {
        debug!(status = monitor.status.as_str(), "monitor not active, skipping");
        return Ok(RunOutcome::Skipped {
            status: monitor.status,
        });
    }

    let url = deps.validator.validate_with_dns(&monitor.url).await?;
    let page = deps
        .fetcher
        .fetch(&url, deps.config.fetch.capture_screenshots)
        .await?;
    // The browser follows redirects on its own; check where it landed.
    deps.validator.validate(&page.final_url)?;
    let extracted = extract(
        &page.html,
        monitor.mode,
        monitor.selector.as_deref(),
        &monitor.ignore_selectors,
    )?;
    let normalized = normalize(&extracted.content, monitor.mode);
    let hash = content_hash(&normalized);

    let raw_meta = page.raw_meta();
    let screenshot_mime = page.screenshot.as_ref().map(|_| SCREENSHOT_MIME.to_string());
    let snapshot = Snapshot::builder()
        .monitor_id(monitor.id)
        .source(page.source)
        .http_status(page.status.map(i32::from))
        .content_type(extracted.content_type)
        .content(normalized)
        .screenshot(page.screenshot)
        .screenshot_mime(screenshot_mime)
        .hash(hash.clone())
        .raw_meta(raw_meta)
        .build();
    deps.store.insert_snapshot(&snapshot).await?;

    let update = SuccessUpdate {
        last_hash: hash,
        last_snapshot_id: snapshot.id,
        checked_at: Utc::now(),
    };

    let previous = match (&monitor.last_hash, monitor.last_snapshot_id) {
        (Some(_), Some(previous_id)) => deps.store.get_snapshot(previous_id).await?,
        _ => None,
    };
    let Some(previous) = previous else {
        deps.store.record_success(monitor.id, &update).await?;
        return Ok(RunOutcome::Baseline {
            snapshot_id: snapshot.id,
        });
    };

    if monitor.last_hash.as_deref() == Some(update.last_hash.as_str()) {
        deps.store.record_success(monitor.id, &update).await?;
        return Ok(RunOutcome::Unchanged {
            snapshot_id: snapshot.id,
        });
    }

    let diff = diff_words(&previous.content, &snapshot.content);
    let verdict = classify(
        &ChangeInput {
            prev: &previous.content,
            next: &snapshot.content,
            diff: &diff,
            sensitivity: monitor.sensitivity,
            keywords: &monitor.keywords,
        },
        &deps.config.classifier,
    );

    if !verdict.is_meaningful() {
        debug!(verdict = verdict.as_str(), "change filtered as noise");
        deps.store.record_success(monitor.id, &update).await?;
        return Ok(RunOutcome::Noise {
            snapshot_id: snapshot.id,
            verdict,
        });
    }

    let summary = summarize(monitor.mode, &diff);
    let event = ChangeEvent::builder()
        .monitor_id(monitor.id)
        .previous_snapshot_id(previous.id)
        .current_snapshot_id(snapshot.id)
        .diff_html(diff.to_html())
        .diff_text(diff.to_plain())
        .summary(summary)
        .importance_score(score_importance(&diff))
        .build();
    deps.store.insert_change_event(&event).await?;
    info!(
        event_id = %event.id,
        verdict = verdict.as_str(),
        importance = event.importance_score,
        "meaningful change detected"
    );

    let snippets = diff.snippets(
        &previous.content,
        &snapshot.content,
        deps.config.snippet_limit,
    );
    let notified = notify(deps, &monitor, &event, &snippets.before, &snippets.after).await;

    deps.store.record_success(monitor.id, &update).await?;
    Ok(RunOutcome::Changed {
        snapshot_id: snapshot.id,
        event_id: event.id,
        notified,
    })
}

/// Deliver the alert and record the outcome on the event.
///
/// Recipient lookup and delivery failures are recorded on the event and never
/// fail the run, so the baseline still advances past the stored event.
/// Without recipients nothing is sent and the event stays un-notified.
async fn notify(
    deps: &WatchDeps,
    monitor: &Monitor,
    event: &ChangeEvent,
    before: &str,
    after: &str,
) -> bool {
    let context = match deps.store.notification_context(monitor.project_id).await {
        Ok(context) => context,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "recipient lookup failed");
            record_notify_failure(deps, event, &format!("recipient lookup failed: {}", e)).await;
            return false;
        }
    };
    let recipients = resolve_recipients(&context);
    if recipients.is_empty() {
        debug!(event_id = %event.id, "no recipients, skipping notification");
        return false;
    }

    let email = ChangeEmail {
        monitor_name: monitor.display_name(),
        url: &monitor.url,
        summary: &event.summary,
        diff_html: &event.diff_html,
        before,
        after,
        app_url: &deps.config.app_url,
        monitor_id: monitor.id,
        event_id: event.id,
    };

    match deps.notifier.send_change(&recipients, &email).await {
        Ok(()) => {
            if let Err(e) = deps.store.mark_notified(event.id, Utc::now()).await {
                warn!(event_id = %event.id, error = %e, "failed to mark event notified");
            }
            true
        }
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "change notification failed");
            record_notify_failure(deps, event, &e.to_string()).await;
            false
        }
    }
}

async fn record_notify_failure(deps: &WatchDeps, event: &ChangeEvent, message: &str) {
    if let Err(e) = deps.store.mark_notify_failed(event.id, message).await {
        warn!(event_id = %event.id, error = %e, "failed to record notify error");
    }
}
