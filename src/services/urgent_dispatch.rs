//! Last-minute dispatch coordinator.
//!
//! When an appointment needs a cleaner on short notice, fan out to every
//! eligible nearby cleaner over three channels: a stored in-app alert (the
//! canonical "was notified" signal), push, and email — plus targeted realtime
//! events when a live channel is wired. One cleaner's failure never blocks
//! the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::defaults::DEFAULT_NOTIFICATION_RADIUS_MILES;
use crate::services::codec::{parse_lat_lon, CoordinateCodec};
use crate::services::email_sender::EmailSender;
use crate::services::email_templates::UrgentJobEmail;
use crate::services::nearby_finder::{CandidateCleaner, FinderOptions, NearbyCleanerFinder};
use crate::services::pricing::PricingProvider;
use crate::services::push_sender::{PushMessage, PushSender};
use crate::services::realtime::{cleaner_room, RealtimeNotifier};
use crate::types::{
    Appointment, DispatchResult, Home, NewNotification, NOTIFICATION_LAST_MINUTE_URGENT,
};

/// Upper bound on a single push/email call so one hung connection cannot
/// stall the whole batch.
const CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Storage consumed by a dispatch run.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Create the in-app alert row — the canonical notification record.
    async fn create_notification(&self, notification: NewNotification) -> Result<Uuid>;

    async fn unread_count(&self, cleaner_id: Uuid) -> Result<i64>;

    /// Stamp the appointment as dispatched.
    async fn mark_dispatched(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

pub struct PgDispatchStore {
    pool: PgPool,
}

impl PgDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn create_notification(&self, notification: NewNotification) -> Result<Uuid> {
        queries::notification::create_notification(&self.pool, &notification).await
    }

    async fn unread_count(&self, cleaner_id: Uuid) -> Result<i64> {
        queries::notification::unread_count(&self.pool, cleaner_id).await
    }

    async fn mark_dispatched(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        queries::appointment::mark_last_minute_dispatched(&self.pool, appointment_id, at).await
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct UrgentDispatchCoordinator {
    finder: NearbyCleanerFinder,
    store: Arc<dyn DispatchStore>,
    pricing: Arc<dyn PricingProvider>,
    codec: Arc<dyn CoordinateCodec>,
    email: Arc<dyn EmailSender>,
    push: Arc<dyn PushSender>,
    realtime: Option<Arc<dyn RealtimeNotifier>>,
}

impl UrgentDispatchCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        finder: NearbyCleanerFinder,
        store: Arc<dyn DispatchStore>,
        pricing: Arc<dyn PricingProvider>,
        codec: Arc<dyn CoordinateCodec>,
        email: Arc<dyn EmailSender>,
        push: Arc<dyn PushSender>,
        realtime: Option<Arc<dyn RealtimeNotifier>>,
    ) -> Self {
        Self { finder, store, pricing, codec, email, push, realtime }
    }

    /// Notify nearby cleaners about an urgent appointment.
    ///
    /// Always yields a count — possibly zero. Unreadable home coordinates and
    /// an empty candidate set are expected outcomes, not errors; only
    /// systemic store failures propagate.
    pub async fn notify_nearby_cleaners(
        &self,
        appointment: &Appointment,
        home: &Home,
    ) -> Result<DispatchResult> {
        let radius_miles = match self.pricing.last_minute().await {
            Ok(config) => config
                .notification_radius_miles
                .unwrap_or(DEFAULT_NOTIFICATION_RADIUS_MILES),
            Err(e) => {
                warn!(error = %e, "pricing config unavailable — using default dispatch radius");
                DEFAULT_NOTIFICATION_RADIUS_MILES
            }
        };

        let Some((home_lat, home_lon)) = self.decode_home_location(home) else {
            return Ok(DispatchResult::empty());
        };

        let candidates = self
            .finder
            .find_nearby(home_lat, home_lon, radius_miles, &FinderOptions::default())
            .await?;
        if candidates.is_empty() {
            info!(
                appointment_id = %appointment.id,
                radius_miles,
                "no eligible cleaners in range — nothing to dispatch"
            );
            return Ok(DispatchResult::empty());
        }

        let mut cleaner_ids = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match self.notify_candidate(appointment, home, candidate).await {
                Ok(()) => cleaner_ids.push(candidate.cleaner.id),
                Err(e) => warn!(
                    cleaner_id = %candidate.cleaner.id,
                    error = %e,
                    "urgent alert failed — continuing with remaining cleaners"
                ),
            }
        }

        // The dispatch stamp records that a run happened, regardless of how
        // many cleaners could actually be reached.
        self.store.mark_dispatched(appointment.id, Utc::now()).await?;

        info!(
            appointment_id = %appointment.id,
            notified = cleaner_ids.len(),
            of = candidates.len(),
            "urgent dispatch complete"
        );

        Ok(DispatchResult {
            notified_count: cleaner_ids.len(),
            cleaner_ids,
        })
    }

    /// Stored home coordinates are encrypted; stale or corrupt payloads are a
    /// known, recoverable condition — log and skip the dispatch.
    fn decode_home_location(&self, home: &Home) -> Option<(f64, f64)> {
        let ciphertext = match home.location_encrypted.as_deref() {
            Some(c) => c,
            None => {
                warn!(home_id = %home.id, "home has no stored location — skipping dispatch");
                return None;
            }
        };

        let plaintext = match self.codec.decrypt(ciphertext) {
            Ok(p) => p,
            Err(e) => {
                warn!(home_id = %home.id, error = %e, "could not decode home location — skipping dispatch");
                return None;
            }
        };

        match parse_lat_lon(&plaintext) {
            Some(coords) => Some(coords),
            None => {
                warn!(home_id = %home.id, "home location is not a finite lat/lon — skipping dispatch");
                return None;
            }
        }
    }

    /// The in-app alert decides whether this cleaner counts as notified.
    /// Push, email and realtime are best-effort enhancements: their failures
    /// are logged per channel and never propagate.
    async fn notify_candidate(
        &self,
        appointment: &Appointment,
        home: &Home,
        candidate: &CandidateCleaner,
    ) -> Result<()> {
        let cleaner = &candidate.cleaner;

        self.store
            .create_notification(NewNotification {
                cleaner_id: cleaner.id,
                kind: NOTIFICATION_LAST_MINUTE_URGENT.to_string(),
                action_required: true,
                appointment_id: Some(appointment.id),
                home_id: Some(home.id),
                price_cents: Some(appointment.price_cents),
                distance_miles: Some(candidate.distance_miles),
                expires_at: Some(appointment.alert_expiry()),
            })
            .await?;

        if let Some(token) = &cleaner.push_token {
            let push = urgent_push_message(appointment, home, candidate);
            match timeout(CHANNEL_TIMEOUT, self.push.send(token, push)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(cleaner_id = %cleaner.id, error = %e, "urgent push failed"),
                Err(_) => warn!(cleaner_id = %cleaner.id, "urgent push timed out"),
            }
        }

        if cleaner.has_email_opt_in() {
            if let Some(email) = &cleaner.email {
                let msg = UrgentJobEmail {
                    to: email,
                    city: &home.city,
                    price_cents: appointment.price_cents,
                    distance_miles: candidate.distance_miles,
                    scheduled_date: appointment.scheduled_date,
                }
                .render();
                match timeout(CHANNEL_TIMEOUT, self.email.send(msg)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(cleaner_id = %cleaner.id, error = %e, "urgent email failed"),
                    Err(_) => warn!(cleaner_id = %cleaner.id, "urgent email timed out"),
                }
            }
        }

        if let Some(rt) = &self.realtime {
            self.emit_realtime(rt, appointment, home, candidate).await;
        }

        Ok(())
    }

    async fn emit_realtime(
        &self,
        rt: &Arc<dyn RealtimeNotifier>,
        appointment: &Appointment,
        home: &Home,
        candidate: &CandidateCleaner,
    ) {
        let cleaner_id = candidate.cleaner.id;
        let room = cleaner_room(cleaner_id);

        let summary = json!({
            "appointmentId": appointment.id,
            "homeId": home.id,
            "city": home.city,
            "priceCents": appointment.price_cents,
            "distanceMiles": candidate.distance_miles,
            "scheduledDate": appointment.scheduled_date,
        });
        if let Err(e) = rt.emit(&room, "job:urgent", summary).await {
            warn!(%cleaner_id, error = %e, "realtime job event failed");
            return;
        }

        match self.store.unread_count(cleaner_id).await {
            Ok(unread) => {
                if let Err(e) = rt.emit(&room, "notifications:count", json!({ "unread": unread })).await {
                    warn!(%cleaner_id, error = %e, "realtime unread-count event failed");
                }
            }
            Err(e) => warn!(%cleaner_id, error = %e, "could not load unread count"),
        }
    }
}

fn urgent_push_message(
    appointment: &Appointment,
    home: &Home,
    candidate: &CandidateCleaner,
) -> PushMessage {
    let dollars = appointment.price_cents as f64 / 100.0;
    PushMessage {
        title: "Urgent job nearby!".to_string(),
        body: format!(
            "${:.2} cleaning in {} — {:.1} miles away. First come, first served.",
            dollars, home.city, candidate.distance_miles,
        ),
        data: json!({
            "type": NOTIFICATION_LAST_MINUTE_URGENT,
            "appointmentId": appointment.id,
            "homeId": home.id,
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::codec::{Base64Codec, CodecError};
    use crate::services::email_sender::FakeEmailSender;
    use crate::services::geo::MILE_IN_METERS;
    use crate::services::nearby_finder::CleanerDirectory;
    use crate::services::pricing::{LastMinuteConfig, StaticPricingProvider};
    use crate::services::push_sender::FakePushSender;
    use crate::services::realtime::FakeRealtimeNotifier;
    use crate::types::{Cleaner, APPOINTMENT_OPEN};
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    const HOME_LAT: f64 = 42.3601;
    const HOME_LON: f64 = -71.0589;
    const METERS_PER_DEG_LAT: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

    struct FakeDirectory(Vec<Cleaner>);

    #[async_trait]
    impl CleanerDirectory for FakeDirectory {
        async fn dispatchable_cleaners(&self) -> Result<Vec<Cleaner>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeDispatchStore {
        notifications: Mutex<Vec<NewNotification>>,
        fail_for: Mutex<HashSet<Uuid>>,
        dispatched: Mutex<Option<(Uuid, DateTime<Utc>)>>,
    }

    impl FakeDispatchStore {
        fn failing_for(self, cleaner_id: Uuid) -> Self {
            self.fail_for.lock().insert(cleaner_id);
            self
        }

        fn created(&self) -> Vec<NewNotification> {
            self.notifications.lock().clone()
        }

        fn dispatch_stamp(&self) -> Option<(Uuid, DateTime<Utc>)> {
            *self.dispatched.lock()
        }
    }

    #[async_trait]
    impl DispatchStore for FakeDispatchStore {
        async fn create_notification(&self, notification: NewNotification) -> Result<Uuid> {
            if self.fail_for.lock().contains(&notification.cleaner_id) {
                return Err(anyhow::anyhow!("insert failed"));
            }
            self.notifications.lock().push(notification);
            Ok(Uuid::new_v4())
        }

        async fn unread_count(&self, cleaner_id: Uuid) -> Result<i64> {
            Ok(self
                .notifications
                .lock()
                .iter()
                .filter(|n| n.cleaner_id == cleaner_id)
                .count() as i64)
        }

        async fn mark_dispatched(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<()> {
            *self.dispatched.lock() = Some((appointment_id, at));
            Ok(())
        }
    }

    struct FailingCodec;

    impl CoordinateCodec for FailingCodec {
        fn decrypt(&self, _ciphertext: &str) -> Result<String, CodecError> {
            Err(CodecError::Malformed("key mismatch".to_string()))
        }

        fn encrypt(&self, plaintext: &str) -> String {
            plaintext.to_string()
        }
    }

    fn cleaner_at_miles(miles: f64) -> Cleaner {
        Cleaner {
            id: Uuid::new_v4(),
            name: "Dana".to_string(),
            email: None,
            user_type: "cleaner".to_string(),
            is_frozen: false,
            service_area_latitude: Some(format!(
                "{:.8}",
                HOME_LAT + miles * MILE_IN_METERS / METERS_PER_DEG_LAT
            )),
            service_area_longitude: Some(format!("{:.8}", HOME_LON)),
            service_area_radius_miles: Some("30".to_string()),
            notification_preferences: vec![],
            push_token: None,
            is_business_owner: false,
            business_verification_status: None,
            business_highlight_opt_in: None,
            locked_until: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn home() -> Home {
        Home {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            street: "12 Beacon St".to_string(),
            city: "Boston".to_string(),
            postal_code: "02108".to_string(),
            location_encrypted: Some(
                Base64Codec.encrypt(&format!("{},{}", HOME_LAT, HOME_LON)),
            ),
            use_preferred_cleaners: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn appointment() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            home_id: Uuid::new_v4(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: None,
            price_cents: 14_500,
            status: APPOINTMENT_OPEN.to_string(),
            assigned_cleaner_ids: vec![],
            last_minute_notifications_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Fixture {
        store: Arc<FakeDispatchStore>,
        email: Arc<FakeEmailSender>,
        push: Arc<FakePushSender>,
        realtime: Arc<FakeRealtimeNotifier>,
        coordinator: UrgentDispatchCoordinator,
    }

    fn fixture(cleaners: Vec<Cleaner>, store: FakeDispatchStore) -> Fixture {
        fixture_with(cleaners, store, Some(25.0))
    }

    fn fixture_with(
        cleaners: Vec<Cleaner>,
        store: FakeDispatchStore,
        radius: Option<f64>,
    ) -> Fixture {
        let store = Arc::new(store);
        let email = Arc::new(FakeEmailSender::new());
        let push = Arc::new(FakePushSender::new());
        let realtime = Arc::new(FakeRealtimeNotifier::new());

        let coordinator = UrgentDispatchCoordinator::new(
            NearbyCleanerFinder::new(Arc::new(FakeDirectory(cleaners))),
            Arc::clone(&store) as Arc<dyn DispatchStore>,
            Arc::new(StaticPricingProvider(LastMinuteConfig {
                notification_radius_miles: radius,
            })),
            Arc::new(Base64Codec),
            Arc::clone(&email) as Arc<dyn EmailSender>,
            Arc::clone(&push) as Arc<dyn PushSender>,
            Some(Arc::clone(&realtime) as Arc<dyn RealtimeNotifier>),
        );

        Fixture { store, email, push, realtime, coordinator }
    }

    #[tokio::test]
    async fn test_notifies_every_eligible_cleaner_in_rank_order() {
        let mut near = cleaner_at_miles(2.0);
        near.push_token = Some("ExponentPushToken[near]".to_string());
        near.notification_preferences = vec!["email".to_string()];
        near.email = Some("near@example.com".to_string());
        let far = cleaner_at_miles(10.0);
        let (near_id, far_id) = (near.id, far.id);

        let f = fixture(vec![far, near], FakeDispatchStore::default());
        let appointment = appointment();

        let result = f.coordinator.notify_nearby_cleaners(&appointment, &home()).await.unwrap();

        assert_eq!(result.notified_count, 2);
        assert_eq!(result.cleaner_ids, vec![near_id, far_id]);

        let created = f.store.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].kind, NOTIFICATION_LAST_MINUTE_URGENT);
        assert!(created[0].action_required);
        assert_eq!(created[0].price_cents, Some(14_500));
        assert_eq!(created[0].distance_miles, Some(2.0));
        assert_eq!(
            created[0].expires_at.unwrap().to_rfc3339(),
            "2026-03-14T23:59:59+00:00"
        );

        // Push and email only reach the opted-in cleaner
        let pushes = f.push.sent_messages();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "ExponentPushToken[near]");
        assert!(pushes[0].1.body.contains("$145.00"));
        assert!(pushes[0].1.body.contains("Boston"));
        assert!(pushes[0].1.body.contains("2.0 miles"));

        let emails = f.email.sent_messages();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "near@example.com");

        // Realtime: job event plus unread count per counted cleaner
        let events = f.realtime.emitted();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].0, cleaner_room(near_id));
        assert_eq!(events[0].1, "job:urgent");
        assert_eq!(events[1].1, "notifications:count");
        assert_eq!(events[1].2["unread"], 1);

        // Dispatch stamp recorded
        assert_eq!(f.store.dispatch_stamp().unwrap().0, appointment.id);
    }

    #[tokio::test]
    async fn test_failure_for_one_cleaner_does_not_block_the_rest() {
        let failing = cleaner_at_miles(2.0);
        let surviving = cleaner_at_miles(10.0);
        let (failing_id, surviving_id) = (failing.id, surviving.id);

        let f = fixture(
            vec![failing, surviving],
            FakeDispatchStore::default().failing_for(failing_id),
        );
        let appointment = appointment();

        let result = f.coordinator.notify_nearby_cleaners(&appointment, &home()).await.unwrap();

        assert_eq!(result.notified_count, 1);
        assert_eq!(result.cleaner_ids, vec![surviving_id]);
        // The failed cleaner left no row; the run still stamped the appointment
        assert_eq!(f.store.created().len(), 1);
        assert!(f.store.dispatch_stamp().is_some());
    }

    #[tokio::test]
    async fn test_empty_candidate_set_short_circuits() {
        let f = fixture(vec![], FakeDispatchStore::default());

        let result = f.coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();

        assert_eq!(result, DispatchResult::empty());
        assert!(f.store.created().is_empty());
        assert!(f.push.sent_messages().is_empty());
        assert!(f.email.sent_messages().is_empty());
        assert!(f.realtime.emitted().is_empty());
        assert!(f.store.dispatch_stamp().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_cleaner_yields_zero_notified() {
        // 50 miles away with a 25-mile search radius
        let mut distant = cleaner_at_miles(50.0);
        distant.service_area_radius_miles = Some("80".to_string());

        let f = fixture(vec![distant], FakeDispatchStore::default());
        let result = f.coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();

        assert_eq!(result.notified_count, 0);
        assert!(f.store.created().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_home_location_aborts_quietly() {
        let store = Arc::new(FakeDispatchStore::default());
        let coordinator = UrgentDispatchCoordinator::new(
            NearbyCleanerFinder::new(Arc::new(FakeDirectory(vec![cleaner_at_miles(2.0)]))),
            Arc::clone(&store) as Arc<dyn DispatchStore>,
            Arc::new(StaticPricingProvider(LastMinuteConfig {
                notification_radius_miles: Some(25.0),
            })),
            Arc::new(FailingCodec),
            Arc::new(FakeEmailSender::new()),
            Arc::new(FakePushSender::new()),
            None,
        );

        let result = coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();

        assert_eq!(result, DispatchResult::empty());
        assert!(store.created().is_empty());
        assert!(store.dispatch_stamp().is_none());
    }

    #[tokio::test]
    async fn test_missing_home_location_aborts_quietly() {
        let f = fixture(vec![cleaner_at_miles(2.0)], FakeDispatchStore::default());
        let mut no_location = home();
        no_location.location_encrypted = None;

        let result = f.coordinator.notify_nearby_cleaners(&appointment(), &no_location).await.unwrap();

        assert_eq!(result, DispatchResult::empty());
        assert!(f.store.created().is_empty());
    }

    #[tokio::test]
    async fn test_partial_pricing_config_defaults_to_25_miles() {
        // 20 miles away: inside the default radius, outside a 10-mile one
        let f = fixture_with(vec![cleaner_at_miles(20.0)], FakeDispatchStore::default(), None);
        let result = f.coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();
        assert_eq!(result.notified_count, 1);

        let f = fixture_with(vec![cleaner_at_miles(20.0)], FakeDispatchStore::default(), Some(10.0));
        let result = f.coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();
        assert_eq!(result.notified_count, 0);
    }

    #[tokio::test]
    async fn test_pricing_provider_failure_falls_back_to_default_radius() {
        struct DownPricing;

        #[async_trait]
        impl PricingProvider for DownPricing {
            async fn last_minute(&self) -> Result<LastMinuteConfig> {
                Err(anyhow::anyhow!("settings table missing"))
            }
        }

        let store = Arc::new(FakeDispatchStore::default());
        let coordinator = UrgentDispatchCoordinator::new(
            NearbyCleanerFinder::new(Arc::new(FakeDirectory(vec![cleaner_at_miles(20.0)]))),
            Arc::clone(&store) as Arc<dyn DispatchStore>,
            Arc::new(DownPricing),
            Arc::new(Base64Codec),
            Arc::new(FakeEmailSender::new()),
            Arc::new(FakePushSender::new()),
            None,
        );

        let result = coordinator.notify_nearby_cleaners(&appointment(), &home()).await.unwrap();
        assert_eq!(result.notified_count, 1);
    }

    #[tokio::test]
    async fn test_dispatch_stamps_even_when_no_cleaner_succeeds() {
        let only = cleaner_at_miles(2.0);
        let only_id = only.id;

        let f = fixture(vec![only], FakeDispatchStore::default().failing_for(only_id));
        let appointment = appointment();

        let result = f.coordinator.notify_nearby_cleaners(&appointment, &home()).await.unwrap();

        assert_eq!(result.notified_count, 0);
        assert!(result.cleaner_ids.is_empty());
        assert_eq!(f.store.dispatch_stamp().unwrap().0, appointment.id);
    }
}
