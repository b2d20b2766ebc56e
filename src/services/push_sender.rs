//! Mobile push notification abstraction.
//!
//! Same shape as `email_sender`: `PushSender` is the core trait,
//! `ExpoPushSender` talks to the Expo push gateway the mobile apps register
//! with, `LogPushSender` for dev, `FakePushSender` for tests.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// A rendered push notification
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Opaque payload handed to the app for deep-linking
    pub data: serde_json::Value,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, msg: PushMessage) -> Result<()>;
}

// =============================================================================
// LogPushSender — writes to tracing (dev / staging)
// =============================================================================

pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, token: &str, msg: PushMessage) -> Result<()> {
        info!(
            token = %token,
            title = %msg.title,
            "[LogPushSender] Would send push: {}",
            msg.body,
        );
        Ok(())
    }
}

// =============================================================================
// FakePushSender — captures sent messages (tests)
// =============================================================================

#[derive(Default)]
pub struct FakePushSender {
    pub sent: Mutex<Vec<(String, PushMessage)>>,
}

impl FakePushSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for FakePushSender {
    async fn send(&self, token: &str, msg: PushMessage) -> Result<()> {
        self.sent.lock().unwrap().push((token.to_string(), msg));
        Ok(())
    }
}

// =============================================================================
// ExpoPushSender — live Expo push gateway
// =============================================================================

pub struct ExpoPushSender {
    api_url: String,
    access_token: String,
}

impl ExpoPushSender {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api_url: "https://exp.host/--/api/v2/push/send".to_string(),
            access_token: access_token.into(),
        }
    }

    /// Build from env var `EXPO_ACCESS_TOKEN`. Returns `None` if not set.
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("EXPO_ACCESS_TOKEN").ok()?;
        Some(Self::new(access_token))
    }
}

#[async_trait]
impl PushSender for ExpoPushSender {
    async fn send(&self, token: &str, msg: PushMessage) -> Result<()> {
        let client = reqwest::Client::new();

        let body = json!({
            "to": token,
            "title": msg.title,
            "body": msg.body,
            "data": msg.data,
            "sound": "default",
            "priority": "high",
        });

        let response = client
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Expo push API error {}: {}", status, body));
        }

        info!(token = %token, title = %msg.title, "Push sent via Expo");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
