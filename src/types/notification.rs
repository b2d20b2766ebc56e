//! In-app notification and dispatch result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Urgent last-minute job alert (action required, expires end of day)
pub const NOTIFICATION_LAST_MINUTE_URGENT: &str = "last_minute_urgent";
/// A homeowner designated the cleaner as preferred
pub const NOTIFICATION_PREFERRED_ADDED: &str = "preferred_cleaner_added";

/// A stored in-app notification row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub cleaner_id: Uuid,
    pub kind: String,
    pub action_required: bool,
    pub appointment_id: Option<Uuid>,
    pub home_id: Option<Uuid>,
    pub price_cents: Option<i64>,
    pub distance_miles: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new in-app notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub cleaner_id: Uuid,
    pub kind: String,
    pub action_required: bool,
    pub appointment_id: Option<Uuid>,
    pub home_id: Option<Uuid>,
    pub price_cents: Option<i64>,
    pub distance_miles: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of one urgent dispatch run. Ephemeral — returned to the caller,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub notified_count: usize,
    /// Notified cleaners in rank order, no duplicates
    pub cleaner_ids: Vec<Uuid>,
}

impl DispatchResult {
    pub fn empty() -> Self {
        Self {
            notified_count: 0,
            cleaner_ids: Vec::new(),
        }
    }
}

/// brightnest.dispatch.last_minute payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentDispatchPayload {
    pub appointment_id: Uuid,
}

/// brightnest.notification.list payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListPayload {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Reply to brightnest.notification.list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

/// brightnest.notification.read payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub notification_id: Uuid,
}

/// Reply to brightnest.notification.read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub notification_id: Uuid,
    /// False when the notification was missing or already read
    pub changed: bool,
}
