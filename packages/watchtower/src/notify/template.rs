//! Change alert email rendering.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::diff::escape_html;
use crate::traits::mailer::EmailMessage;

lazy_static! {
    static ref TAGS: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Everything a change alert shows.
#[derive(Debug, Clone)]
pub struct ChangeEmail<'a> {
    pub monitor_name: &'a str,
    pub url: &'a str,
    pub summary: &'a str,
    /// Already-escaped diff markup
    pub diff_html: &'a str,
    pub before: &'a str,
    pub after: &'a str,
    pub app_url: &'a str,
    pub monitor_id: Uuid,
    pub event_id: Uuid,
}

impl ChangeEmail<'_> {
    /// Link to the event in the dashboard history.
    pub fn history_link(&self) -> String {
        format!(
            "{}/monitors/{}#event-{}",
            self.app_url.trim_end_matches('/'),
            self.monitor_id,
            self.event_id
        )
    }
}

/// Render subject, HTML and text bodies.
pub fn build_change_email(to: Vec<String>, email: &ChangeEmail<'_>) -> EmailMessage {
    let subject = format!("Watchtower: {} changed", email.monitor_name);
    let link = email.history_link();

    let html = format!(
        r#"<div style="font-family:Arial,sans-serif;line-height:1.5;color:#111827;">
  <style>
    ins {{ background:#dcfce7;color:#166534;text-decoration:none; }}
    del {{ background:#fee2e2;color:#991b1b;text-decoration:line-through; }}
  </style>
  <h2 style="margin:0 0 12px;">{name} changed</h2>
  <p style="margin:0 0 12px;">{summary}</p>
  <p style="margin:0 0 16px;"><a href="{url}" style="color:#2563eb;">{url}</a></p>
  <h3 style="margin:24px 0 8px;">What changed</h3>
  <div style="padding:12px;border:1px solid #e5e7eb;border-radius:8px;background:#f9fafb;white-space:pre-wrap;">{diff}</div>
  <h3 style="margin:24px 0 8px;">Before</h3>
  <div style="padding:12px;border:1px solid #e5e7eb;border-radius:8px;white-space:pre-wrap;">{before}</div>
  <h3 style="margin:24px 0 8px;">After</h3>
  <div style="padding:12px;border:1px solid #e5e7eb;border-radius:8px;white-space:pre-wrap;">{after}</div>
  <p style="margin:24px 0 0;"><a href="{link}" style="display:inline-block;background:#2563eb;color:#fff;padding:10px 16px;border-radius:6px;text-decoration:none;">View change history</a></p>
</div>"#,
        name = escape_html(email.monitor_name),
        summary = escape_html(email.summary),
        url = escape_html(email.url),
        diff = email.diff_html,
        before = escape_html(email.before),
        after = escape_html(email.after),
        link = escape_html(&link),
    );

    let text = [
        format!("{} changed", email.monitor_name),
        email.summary.to_string(),
        email.url.to_string(),
        String::new(),
        "What changed:".to_string(),
        strip_tags(email.diff_html),
        String::new(),
        "Before:".to_string(),
        email.before.to_string(),
        String::new(),
        "After:".to_string(),
        email.after.to_string(),
        String::new(),
        format!("View change history: {}", link),
    ]
    .join("\n");

    EmailMessage {
        to,
        subject,
        html,
        text,
    }
}

fn strip_tags(html: &str) -> String {
    TAGS.replace_all(html, "").into_owned()
}
