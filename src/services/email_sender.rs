//! Transactional email sending abstraction.
//!
//! `EmailSender` is the core trait — `ResendEmailSender` in production,
//! `LogEmailSender` in dev/staging (logs to tracing), `FakeEmailSender` in
//! tests. `DemoRedirectEmailSender` wraps any of them to reroute mail
//! addressed to the shared demo account.
//!
//! The trait is object-safe so callers can hold `Arc<dyn EmailSender>`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

// =============================================================================
// Core trait
// =============================================================================

/// Represents a rendered email message ready to send.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Abstraction over an email transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, msg: EmailMessage) -> Result<()>;
}

// =============================================================================
// LogEmailSender — writes to tracing (dev / staging)
// =============================================================================

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        info!(
            to = %msg.to,
            subject = %msg.subject,
            "[LogEmailSender] Would send email\n---HTML---\n{}\n---TEXT---\n{}",
            msg.html,
            msg.text,
        );
        Ok(())
    }
}

// =============================================================================
// FakeEmailSender — captures sent messages in a Vec (tests)
// =============================================================================

/// Collects sent messages in memory for assertion in tests.
#[derive(Default)]
pub struct FakeEmailSender {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl FakeEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_message(&self) -> Option<EmailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

// =============================================================================
// ResendEmailSender — live Resend.com API
// =============================================================================

pub struct ResendEmailSender {
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    /// Build from env vars `RESEND_API_KEY` and `EMAIL_FROM_ADDRESS`.
    /// Returns `None` if `RESEND_API_KEY` is not set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        let from = std::env::var("EMAIL_FROM_ADDRESS")
            .unwrap_or_else(|_| "noreply@brightnest.app".to_string());
        Some(Self::new(api_key, from))
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        let client = reqwest::Client::new();

        let mut body = HashMap::new();
        body.insert("from", self.from.as_str());
        body.insert("to", msg.to.as_str());
        body.insert("subject", msg.subject.as_str());
        body.insert("html", msg.html.as_str());
        body.insert("text", msg.text.as_str());

        let response = client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Resend API error {}: {}", status, body));
        }

        info!(to = %msg.to, subject = %msg.subject, "Email sent via Resend");
        Ok(())
    }
}

// =============================================================================
// DemoRedirectEmailSender — reroutes demo-account mail
// =============================================================================

/// Decorator that rewrites mail addressed to the shared demo account to the
/// preview-owner inbox, tagging the subject with the original recipient.
/// Sales demos run against production data, so anything the demo account
/// would receive must land somewhere a human actually reads.
pub struct DemoRedirectEmailSender {
    inner: Arc<dyn EmailSender>,
    demo_address: String,
    preview_owner_address: String,
}

impl DemoRedirectEmailSender {
    pub fn new(
        inner: Arc<dyn EmailSender>,
        demo_address: impl Into<String>,
        preview_owner_address: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            demo_address: demo_address.into(),
            preview_owner_address: preview_owner_address.into(),
        }
    }

    /// Wrap `inner` when `DEMO_ACCOUNT_EMAIL` and `PREVIEW_OWNER_EMAIL` are
    /// both configured; otherwise return `inner` unchanged.
    pub fn wrap_from_env(inner: Arc<dyn EmailSender>) -> Arc<dyn EmailSender> {
        match (
            std::env::var("DEMO_ACCOUNT_EMAIL"),
            std::env::var("PREVIEW_OWNER_EMAIL"),
        ) {
            (Ok(demo), Ok(preview)) if !demo.is_empty() && !preview.is_empty() => {
                Arc::new(Self::new(inner, demo, preview))
            }
            _ => inner,
        }
    }
}

#[async_trait]
impl EmailSender for DemoRedirectEmailSender {
    async fn send(&self, mut msg: EmailMessage) -> Result<()> {
        if msg.to.eq_ignore_ascii_case(&self.demo_address) {
            info!(
                original = %msg.to,
                redirected = %self.preview_owner_address,
                "Redirecting demo-account email"
            );
            msg.subject = format!("[demo: {}] {}", self.demo_address, msg.subject);
            msg.to = self.preview_owner_address.clone();
        }
        self.inner.send(msg).await
    }
}

// =============================================================================
// Tests
// =============================================================================
