//! Booking flow types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which flow a booking request takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    /// Skip approval and assign immediately (preferred cleaner)
    DirectBooking,
    /// Create a pending request and wait for the homeowner
    RequestApproval,
}

/// Outcome of the booking decision engine. Ephemeral — computed per request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDecision {
    pub action: BookingAction,
    pub create_pending_request: bool,
    pub assign_immediately: bool,
    /// User-facing status message shown to the requesting cleaner
    pub message: String,
}

/// brightnest.booking.request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestPayload {
    pub appointment_id: Uuid,
    pub home_id: Uuid,
}

/// Reply to brightnest.booking.request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestResponse {
    pub appointment_id: Uuid,
    pub action: BookingAction,
    pub message: String,
}
