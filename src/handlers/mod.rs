//! NATS message handlers

pub mod booking;
pub mod dispatch;
pub mod notification;
pub mod ping;
pub mod preferred;
pub mod review;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::codec::{Base64Codec, CoordinateCodec};
use crate::services::email_sender::{
    DemoRedirectEmailSender, EmailSender, LogEmailSender, ResendEmailSender,
};
use crate::services::nearby_finder::{NearbyCleanerFinder, PgCleanerDirectory};
use crate::services::preferred_cleaner::{PgPreferredCleanerStore, PreferredCleanerRegistry};
use crate::services::pricing::PgPricingProvider;
use crate::services::push_sender::{ExpoPushSender, LogPushSender, PushSender};
use crate::services::rate_limiter::{ActionRateLimiter, RateLimit};
use crate::services::realtime::{NatsRealtimeNotifier, RealtimeNotifier};
use crate::services::urgent_dispatch::{PgDispatchStore, UrgentDispatchCoordinator};

/// Build the email capability: Resend when configured, tracing otherwise,
/// always behind the demo-redirect decorator.
fn create_email_sender() -> Arc<dyn EmailSender> {
    let base: Arc<dyn EmailSender> = match ResendEmailSender::from_env() {
        Some(sender) => {
            info!("Email sender: Resend");
            Arc::new(sender)
        }
        None => {
            info!("Email sender: log only (RESEND_API_KEY not set)");
            Arc::new(LogEmailSender)
        }
    };
    DemoRedirectEmailSender::wrap_from_env(base)
}

fn create_push_sender() -> Arc<dyn PushSender> {
    match ExpoPushSender::from_env() {
        Some(sender) => {
            info!("Push sender: Expo");
            Arc::new(sender)
        }
        None => {
            info!("Push sender: log only (EXPO_ACCESS_TOKEN not set)");
            Arc::new(LogPushSender)
        }
    }
}

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());

    // Shared capabilities
    let email = create_email_sender();
    let push = create_push_sender();
    let codec: Arc<dyn CoordinateCodec> = Arc::new(Base64Codec);
    let realtime: Arc<dyn RealtimeNotifier> = Arc::new(NatsRealtimeNotifier::new(client.clone()));

    let registry = Arc::new(PreferredCleanerRegistry::new(
        Arc::new(PgPreferredCleanerStore::new(pool.clone())),
        Arc::clone(&email),
        Arc::clone(&push),
    ));

    let coordinator = Arc::new(UrgentDispatchCoordinator::new(
        NearbyCleanerFinder::new(Arc::new(PgCleanerDirectory::new(pool.clone()))),
        Arc::new(PgDispatchStore::new(pool.clone())),
        Arc::new(PgPricingProvider::new(pool.clone())),
        codec,
        Arc::clone(&email),
        Arc::clone(&push),
        Some(realtime),
    ));

    let rate_limiter = Arc::new(ActionRateLimiter::new(vec![
        ("booking.request", RateLimit { max_attempts: 10, window_secs: 60 }),
        ("review.submitted", RateLimit { max_attempts: 30, window_secs: 3600 }),
        ("dispatch.last_minute", RateLimit { max_attempts: 3, window_secs: 300 }),
    ]));

    // Subscribe to all subjects
    let ping_sub = client.subscribe("brightnest.ping").await?;
    let booking_request_sub = client.subscribe("brightnest.booking.request").await?;
    let review_submitted_sub = client.subscribe("brightnest.review.submitted").await?;
    let preferred_set_sub = client.subscribe("brightnest.preferred.set").await?;
    let preferred_unset_sub = client.subscribe("brightnest.preferred.unset").await?;
    let preferred_check_sub = client.subscribe("brightnest.preferred.check").await?;
    let dispatch_last_minute_sub = client.subscribe("brightnest.dispatch.last_minute").await?;
    let notification_list_sub = client.subscribe("brightnest.notification.list").await?;
    let notification_read_sub = client.subscribe("brightnest.notification.read").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();
    let client_booking = client.clone();
    let client_review = client.clone();
    let client_preferred_set = client.clone();
    let client_preferred_unset = client.clone();
    let client_preferred_check = client.clone();
    let client_dispatch = client.clone();
    let client_notification_list = client.clone();
    let client_notification_read = client.clone();

    let pool_booking = pool.clone();
    let pool_preferred_set = pool.clone();
    let pool_preferred_unset = pool.clone();
    let pool_dispatch = pool.clone();
    let pool_notification_list = pool.clone();
    let pool_notification_read = pool.clone();

    let jwt_booking = Arc::clone(&jwt_secret);
    let jwt_review = Arc::clone(&jwt_secret);
    let jwt_preferred_set = Arc::clone(&jwt_secret);
    let jwt_preferred_unset = Arc::clone(&jwt_secret);
    let jwt_preferred_check = Arc::clone(&jwt_secret);
    let jwt_dispatch = Arc::clone(&jwt_secret);
    let jwt_notification_list = Arc::clone(&jwt_secret);
    let jwt_notification_read = Arc::clone(&jwt_secret);

    let registry_booking = Arc::clone(&registry);
    let registry_review = Arc::clone(&registry);
    let registry_preferred_set = Arc::clone(&registry);
    let registry_preferred_unset = Arc::clone(&registry);
    let registry_preferred_check = Arc::clone(&registry);

    let limiter_booking = Arc::clone(&rate_limiter);
    let limiter_review = Arc::clone(&rate_limiter);
    let limiter_dispatch = Arc::clone(&rate_limiter);

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let booking_request_handle = tokio::spawn(async move {
        booking::handle_request(
            client_booking,
            booking_request_sub,
            pool_booking,
            jwt_booking,
            registry_booking,
            limiter_booking,
        )
        .await
    });

    let review_submitted_handle = tokio::spawn(async move {
        review::handle_submitted(
            client_review,
            review_submitted_sub,
            jwt_review,
            registry_review,
            limiter_review,
        )
        .await
    });

    let preferred_set_handle = tokio::spawn(async move {
        preferred::handle_set(
            client_preferred_set,
            preferred_set_sub,
            pool_preferred_set,
            jwt_preferred_set,
            registry_preferred_set,
        )
        .await
    });

    let preferred_unset_handle = tokio::spawn(async move {
        preferred::handle_unset(
            client_preferred_unset,
            preferred_unset_sub,
            pool_preferred_unset,
            jwt_preferred_unset,
            registry_preferred_unset,
        )
        .await
    });

    let preferred_check_handle = tokio::spawn(async move {
        preferred::handle_check(
            client_preferred_check,
            preferred_check_sub,
            jwt_preferred_check,
            registry_preferred_check,
        )
        .await
    });

    let dispatch_last_minute_handle = tokio::spawn(async move {
        dispatch::handle_last_minute(
            client_dispatch,
            dispatch_last_minute_sub,
            pool_dispatch,
            jwt_dispatch,
            coordinator,
            limiter_dispatch,
        )
        .await
    });

    let notification_list_handle = tokio::spawn(async move {
        notification::handle_list(
            client_notification_list,
            notification_list_sub,
            pool_notification_list,
            jwt_notification_list,
        )
        .await
    });

    let notification_read_handle = tokio::spawn(async move {
        notification::handle_read(
            client_notification_read,
            notification_read_sub,
            pool_notification_read,
            jwt_notification_read,
        )
        .await
    });

    info!("All handlers started");

    // Handlers run until the NATS connection drops; any one finishing is a
    // shutdown condition.
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = booking_request_handle => {
            error!("Booking request handler finished: {:?}", result);
        }
        result = review_submitted_handle => {
            error!("Review submitted handler finished: {:?}", result);
        }
        result = preferred_set_handle => {
            error!("Preferred set handler finished: {:?}", result);
        }
        result = preferred_unset_handle => {
            error!("Preferred unset handler finished: {:?}", result);
        }
        result = preferred_check_handle => {
            error!("Preferred check handler finished: {:?}", result);
        }
        result = dispatch_last_minute_handle => {
            error!("Dispatch last-minute handler finished: {:?}", result);
        }
        result = notification_list_handle => {
            error!("Notification list handler finished: {:?}", result);
        }
        result = notification_read_handle => {
            error!("Notification read handler finished: {:?}", result);
        }
    }

    Ok(())
}
