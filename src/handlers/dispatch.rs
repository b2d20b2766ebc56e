//! Last-minute dispatch handler

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{self, ROLE_HOMEOWNER};
use crate::db::queries;
use crate::services::rate_limiter::ActionRateLimiter;
use crate::services::urgent_dispatch::UrgentDispatchCoordinator;
use crate::types::{ErrorResponse, Request, SuccessResponse, UrgentDispatchPayload};

/// Handle dispatch.last_minute messages
pub async fn handle_last_minute(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    coordinator: Arc<UrgentDispatchCoordinator>,
    rate_limiter: Arc<ActionRateLimiter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received dispatch.last_minute message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UrgentDispatchPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse dispatch request: {}", e);
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

        if !auth.has_role(ROLE_HOMEOWNER) {
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Only homeowners can trigger urgent dispatch");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        if !rate_limiter.check_and_record("dispatch.last_minute", &auth.user_id.to_string()) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Urgent dispatch already triggered — try again later");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let appointment_id = request.payload.appointment_id;

        let appointment = match queries::appointment::get_appointment(&pool, appointment_id).await {
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

        let home = match queries::home::get_home(&pool, appointment.home_id).await {
            Ok(Some(home)) => home,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Home not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
            Err(e) => {
                error!("Failed to load home: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        if home.owner_id != auth.user_id && !auth.is_admin() {
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Only the home's owner can dispatch for this appointment");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        info!(
            "Urgent dispatch for appointment {} at home {}",
            appointment.id, home.id
        );

        match coordinator.notify_nearby_cleaners(&appointment, &home).await {
            Ok(result) => {
                info!(
                    "Dispatched appointment {}: notified {} cleaners",
                    appointment.id, result.notified_count
                );
                let response = SuccessResponse::new(request.id, result);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("Urgent dispatch failed: {}", e);
                let error = ErrorResponse::new(request.id, "DISPATCH_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
