//! Cleaner profile types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification channel tag stored in `notification_preferences`
pub const CHANNEL_EMAIL: &str = "email";

/// Value of `business_verification_status` for a verified business
pub const VERIFICATION_VERIFIED: &str = "verified";

/// A cleaner account with its dispatch-relevant profile.
///
/// Service-area coordinates are stored as plain decimal strings, not
/// encrypted — dispatch filters over every active cleaner and cannot afford
/// a decrypt per row. Unparseable values are skipped by the finder, never
/// treated as errors.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cleaner {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub user_type: String,
    pub is_frozen: bool,

    // Service area (center + how far they are willing to travel)
    pub service_area_latitude: Option<String>,
    pub service_area_longitude: Option<String>,
    pub service_area_radius_miles: Option<String>,

    /// Channel tags the cleaner opted into, e.g. {"email", "phone"}
    pub notification_preferences: Vec<String>,
    pub push_token: Option<String>,

    // Business verification
    pub is_business_owner: bool,
    pub business_verification_status: Option<String>,
    pub business_highlight_opt_in: Option<bool>,

    pub locked_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cleaner {
    /// The cleaner accepts email notifications and has an address on file.
    pub fn has_email_opt_in(&self) -> bool {
        self.notification_preferences.iter().any(|c| c == CHANNEL_EMAIL) && self.email.is_some()
    }

    /// The cleaner can receive push notifications.
    pub fn has_push_opt_in(&self) -> bool {
        self.push_token.is_some()
    }

    /// Strict boolean: locked iff `locked_until` is set and in the future.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }
}
