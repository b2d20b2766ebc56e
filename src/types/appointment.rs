//! Appointment types

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const APPOINTMENT_OPEN: &str = "open";
pub const APPOINTMENT_PENDING_APPROVAL: &str = "pending_approval";
pub const APPOINTMENT_ASSIGNED: &str = "assigned";

/// A cleaning appointment at a home
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub home_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub price_cents: i64,
    pub status: String,
    /// Cleaners assigned to the job; direct bookings append here without an
    /// approval round-trip.
    pub assigned_cleaner_ids: Vec<Uuid>,
    /// Stamped once an urgent fan-out has run for this appointment.
    pub last_minute_notifications_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Urgent alerts for this appointment expire at end of day on the
    /// appointment date (UTC).
    pub fn alert_expiry(&self) -> DateTime<Utc> {
        self.scheduled_date
            .and_hms_opt(23, 59, 59)
            .expect("valid static end-of-day time")
            .and_utc()
    }
}

/// Pending approval request from a cleaner for an appointment.
///
/// Unique on (appointment_id, requester_id) — a cleaner asking twice for the
/// same job never produces a second row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub requester_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
