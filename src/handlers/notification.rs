//! In-app notification handlers
//!
//! Cleaner-facing: list recent notifications (expired urgent alerts drop out)
//! and mark one read.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth::{self, ROLE_CLEANER};
use crate::db::queries;
use crate::types::{
    ErrorResponse, MarkReadPayload, MarkReadResponse, NotificationListPayload,
    NotificationListResponse, Request, SuccessResponse,
};

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Handle notification.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received notification.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<NotificationListPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse notification.list request: {}", e);
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
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Notifications are cleaner-facing");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let limit = request.payload.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 200);

        let notifications = queries::notification::list_for_cleaner(&pool, auth.user_id, limit).await;
        let unread = queries::notification::unread_count(&pool, auth.user_id).await;

        match (notifications, unread) {
            (Ok(notifications), Ok(unread)) => {
                let response = SuccessResponse::new(
                    request.id,
                    NotificationListResponse { notifications, unread },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("notification.list failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle notification.read messages
pub async fn handle_read(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received notification.read message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<MarkReadPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse notification.read request: {}", e);
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
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Notifications are cleaner-facing");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let notification_id = request.payload.notification_id;

        match queries::notification::mark_read(&pool, notification_id, auth.user_id).await {
            Ok(changed) => {
                let response = SuccessResponse::new(
                    request.id,
                    MarkReadResponse { notification_id, changed },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("notification.read failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
