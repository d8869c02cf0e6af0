//! Email delivery through the Resend HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use serde::Serialize;
use tracing::error;

use crate::error::{NotifyError, NotifyResult};
use crate::traits::mailer::{EmailMessage, EmailSender};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Resend client.
///
/// A missing API key or sender address fails each send with
/// `NotifyError::Config` rather than failing startup, so monitoring keeps
/// running and the error is recorded per change event.
pub struct ResendMailer {
    client: Client,
    api_key: Option<String>,
    from: Option<String>,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: Option<String>) -> Self {
        Self {
            client: client_with_timeout(SEND_TIMEOUT),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            from: from.filter(|f| !f.trim().is_empty()),
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    /// Point at a different API base (for proxies or local fakes).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Bound each API call to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = client_with_timeout(timeout);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }
}

fn client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NotifyError::Config("RESEND_API_KEY is not set".into()))?;
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("FROM_EMAIL is not set".into()))?;

        let request = ResendRequest {
            from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Resend rejected email");
            return Err(NotifyError::Delivery { status, body });
        }

        Ok(())
    }
}
