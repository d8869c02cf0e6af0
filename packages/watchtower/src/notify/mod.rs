//! Change notification: recipient resolution, email rendering and delivery.
//!
//! Delivery failures are returned to the orchestrator, which records them on
//! the ChangeEvent only. They never fail the run.

pub mod resend;
pub mod template;

use std::sync::Arc;
use tracing::info;

pub use crate::traits::mailer::{EmailMessage, EmailSender};
pub use resend::ResendMailer;
pub use template::{build_change_email, ChangeEmail};

use crate::error::{NotifyError, NotifyResult};
use crate::traits::store::NotificationContext;
use crate::types::TargetKind;

/// Project's enabled email targets, falling back to the owner's address.
pub fn resolve_recipients(context: &NotificationContext) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for target in &context.targets {
        if target.enabled && target.kind == TargetKind::Email {
            let address = target.value.trim();
            if !address.is_empty() && !recipients.iter().any(|r| r == address) {
                recipients.push(address.to_string());
            }
        }
    }
    if recipients.is_empty() {
        if let Some(owner) = context.owner_email.as_deref().map(str::trim) {
            if !owner.is_empty() {
                recipients.push(owner.to_string());
            }
        }
    }
    recipients
}

/// Renders change alerts and hands them to the configured mailer.
pub struct Notifier {
    mailer: Arc<dyn EmailSender>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn EmailSender>) -> Self {
        Self { mailer }
    }

    /// Send one change alert to every recipient in a single message.
    pub async fn send_change(&self, recipients: &[String], email: &ChangeEmail<'_>) -> NotifyResult<()> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let message = build_change_email(recipients.to_vec(), email);
        self.mailer.send(&message).await?;
        info!(
            recipients = recipients.len(),
            subject = %message.subject,
            "change notification sent"
        );
        Ok(())
    }
}
