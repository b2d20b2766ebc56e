//! Booking request handler
//!
//! A cleaner asks for an appointment. The preferred-cleaner registry resolves
//! whether the homeowner trusts this cleaner for this home; the pure decision
//! engine turns that into either a direct booking or a pending approval
//! request, and this handler performs the side effects the decision names.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{self, ROLE_CLEANER};
use crate::db::queries;
use crate::services::booking_decision::decide;
use crate::services::preferred_cleaner::PreferredCleanerRegistry;
use crate::services::rate_limiter::ActionRateLimiter;
use crate::types::{
    BookingRequestPayload, BookingRequestResponse, ErrorResponse, Request, SuccessResponse,
};

/// Handle booking.request messages
pub async fn handle_request(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    registry: Arc<PreferredCleanerRegistry>,
    rate_limiter: Arc<ActionRateLimiter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received booking.request message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<BookingRequestPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse booking request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let auth = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        if !auth.has_role(ROLE_CLEANER) {
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Only cleaners can request jobs");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        if !rate_limiter.check_and_record("booking.request", &auth.user_id.to_string()) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many booking requests — try again shortly");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let payload = request.payload;
        let cleaner_id = auth.user_id;
        info!(
            "Booking request from cleaner {} for appointment {}",
            cleaner_id, payload.appointment_id
        );

        let appointment = match queries::appointment::get_appointment(&pool, payload.appointment_id).await {
            Ok(Some(appointment)) => appointment,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Appointment not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
            Err(e) => {
                error!("Failed to load appointment: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        if appointment.home_id != payload.home_id {
            let error = ErrorResponse::new(request.id, "INVALID_REQUEST", "Appointment does not belong to this home");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let is_preferred = match registry.is_preferred(payload.home_id, cleaner_id).await {
            Ok(preferred) => preferred,
            Err(e) => {
                error!("Preferred lookup failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let decision = decide(is_preferred);

        let side_effect = if decision.assign_immediately {
            queries::appointment::assign_cleaner(&pool, appointment.id, cleaner_id)
                .await
                .map(|_| ())
        } else {
            // A repeat request from the same cleaner is absorbed by the
            // unique index — same reply, no duplicate row.
            queries::appointment::create_pending_request(&pool, appointment.id, cleaner_id)
                .await
                .map(|created| {
                    if !created {
                        debug!(
                            "Pending request already exists for appointment {} / cleaner {}",
                            appointment.id, cleaner_id
                        );
                    }
                })
        };

        if let Err(e) = side_effect {
            error!("Booking side effect failed: {}", e);
            let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let response = SuccessResponse::new(
            request.id,
            BookingRequestResponse {
                appointment_id: appointment.id,
                action: decision.action,
                message: decision.message,
            },
        );
        let _ = client
            .publish(reply, serde_json::to_vec(&response)?.into())
            .await;
    }

    Ok(())
}
