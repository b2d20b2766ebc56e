//! Review-submitted side effects
//!
//! Review persistence lives in the platform API; this handler consumes the
//! post-submission event and applies the one side effect the worker owns:
//! updating the preferred-cleaner registry. The trigger guard is a pure
//! function — only homeowner-to-cleaner reviews that carry the flag and a
//! home id may ever reach the registry.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{self, ROLE_HOMEOWNER};
use crate::services::preferred_cleaner::PreferredCleanerRegistry;
use crate::services::rate_limiter::ActionRateLimiter;
use crate::types::{
    ErrorResponse, Request, ReviewSideEffectResponse, ReviewSubmittedPayload, SetBy,
    SuccessResponse, REVIEW_HOMEOWNER_TO_CLEANER,
};

/// What a submitted review asks the registry to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredAction {
    Set,
    Unset,
}

/// Trigger guard: only reviews of type homeowner_to_cleaner carrying both a
/// set-as-preferred flag and a home id touch the registry. Reverse-direction
/// reviews and reviews without a home never mutate it.
pub fn preferred_action_for_review(
    review: &ReviewSubmittedPayload,
) -> Option<(Uuid, PreferredAction)> {
    if review.review_type != REVIEW_HOMEOWNER_TO_CLEANER {
        return None;
    }
    let home_id = review.home_id?;
    let action = match review.set_as_preferred? {
        true => PreferredAction::Set,
        false => PreferredAction::Unset,
    };
    Some((home_id, action))
}

/// Handle review.submitted messages
pub async fn handle_submitted(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    registry: Arc<PreferredCleanerRegistry>,
    rate_limiter: Arc<ActionRateLimiter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received review.submitted message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ReviewSubmittedPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse review event: {}", e);
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
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Only homeowners submit cleaner reviews");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        if !rate_limiter.check_and_record("review.submitted", &auth.user_id.to_string()) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many review events — try again shortly");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let review = request.payload;

        let updated = match preferred_action_for_review(&review) {
            Some((home_id, PreferredAction::Set)) => {
                info!(
                    "Review {} designates cleaner {} as preferred for home {}",
                    review.review_id, review.cleaner_id, home_id
                );
                registry.set_preferred(home_id, review.cleaner_id, SetBy::Review).await
            }
            Some((home_id, PreferredAction::Unset)) => {
                info!(
                    "Review {} removes cleaner {} as preferred for home {}",
                    review.review_id, review.cleaner_id, home_id
                );
                registry.unset_preferred(home_id, review.cleaner_id).await
            }
            None => {
                debug!("Review {} carries no preferred-cleaner action", review.review_id);
                Ok(false)
            }
        };

        match updated {
            Ok(preferred_updated) => {
                let response = SuccessResponse::new(
                    request.id,
                    ReviewSideEffectResponse {
                        review_id: review.review_id,
                        preferred_updated,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("Preferred registry update failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
