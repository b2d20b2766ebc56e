//! Preferred-cleaner management handlers
//!
//! Explicit homeowner actions — distinct from the review-driven path, which
//! lives in `handlers::review`. Set/unset require ownership of the home;
//! check is open to any authenticated caller (the booking UI shows both
//! sides whether a pair is preferred).

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{self, AuthInfo};
use crate::db::queries;
use crate::services::preferred_cleaner::PreferredCleanerRegistry;
use crate::types::{
    ErrorResponse, PreferredChangeResponse, PreferredCheckResponse, PreferredPairPayload, Request,
    SetBy, SuccessResponse,
};

/// Load the home and verify the caller owns it (admins bypass).
/// Returns an error reply payload on failure.
async fn authorize_home_action(
    pool: &PgPool,
    auth: &AuthInfo,
    request_id: Uuid,
    home_id: Uuid,
) -> Result<(), ErrorResponse> {
    match queries::home::get_home(pool, home_id).await {
        Ok(Some(home)) => {
            if home.owner_id != auth.user_id && !auth.is_admin() {
                return Err(ErrorResponse::new(
                    request_id,
                    "FORBIDDEN",
                    "Only the home's owner can manage preferred cleaners",
                ));
            }
            Ok(())
        }
        Ok(None) => Err(ErrorResponse::new(request_id, "NOT_FOUND", "Home not found")),
        Err(e) => {
            error!("Failed to load home: {}", e);
            Err(ErrorResponse::new(request_id, "DATABASE_ERROR", e.to_string()))
        }
    }
}

/// Handle preferred.set messages
pub async fn handle_set(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    registry: Arc<PreferredCleanerRegistry>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received preferred.set message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PreferredPairPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse preferred.set request: {}", e);
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

        let payload = request.payload;

        if let Err(error) = authorize_home_action(&pool, &auth, request.id, payload.home_id).await {
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        info!(
            "Homeowner {} sets cleaner {} preferred for home {}",
            auth.user_id, payload.cleaner_id, payload.home_id
        );

        match registry
            .set_preferred(payload.home_id, payload.cleaner_id, SetBy::Manual)
            .await
        {
            Ok(changed) => {
                let response = SuccessResponse::new(
                    request.id,
                    PreferredChangeResponse {
                        home_id: payload.home_id,
                        cleaner_id: payload.cleaner_id,
                        changed,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("preferred.set failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle preferred.unset messages
pub async fn handle_unset(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    registry: Arc<PreferredCleanerRegistry>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received preferred.unset message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PreferredPairPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse preferred.unset request: {}", e);
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

        let payload = request.payload;

        if let Err(error) = authorize_home_action(&pool, &auth, request.id, payload.home_id).await {
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        match registry
            .unset_preferred(payload.home_id, payload.cleaner_id)
            .await
        {
            Ok(changed) => {
                let response = SuccessResponse::new(
                    request.id,
                    PreferredChangeResponse {
                        home_id: payload.home_id,
                        cleaner_id: payload.cleaner_id,
                        changed,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("preferred.unset failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle preferred.check messages
pub async fn handle_check(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    registry: Arc<PreferredCleanerRegistry>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received preferred.check message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PreferredPairPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse preferred.check request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        if auth::extract_auth(&request, &jwt_secret).is_err() {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let payload = request.payload;

        match registry.is_preferred(payload.home_id, payload.cleaner_id).await {
            Ok(preferred) => {
                let response = SuccessResponse::new(
                    request.id,
                    PreferredCheckResponse {
                        home_id: payload.home_id,
                        cleaner_id: payload.cleaner_id,
                        preferred,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("preferred.check failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
