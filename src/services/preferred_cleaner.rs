//! Preferred-cleaner registry.
//!
//! Tracks which cleaner a homeowner trusts enough to book without approval,
//! per home. Membership answers feed the booking decision engine; set/unset
//! are idempotent and fire best-effort notifications to the cleaner only when
//! a link is actually created.
//!
//! The unique index on (home_id, cleaner_id) behind `insert_link` is the real
//! duplicate guard — the in-code existence check only saves a round-trip, so
//! racing set calls still converge on one link and one notification.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::email_sender::EmailSender;
use crate::services::email_templates::PreferredCleanerEmail;
use crate::services::push_sender::{PushMessage, PushSender};
use crate::types::{PreferredCleanerLink, SetBy, NOTIFICATION_PREFERRED_ADDED};

/// Contact surface needed for the designation notification
#[derive(Debug, Clone)]
pub struct CleanerContact {
    pub name: String,
    pub email: Option<String>,
    pub push_token: Option<String>,
}

/// Storage behind the registry.
#[async_trait]
pub trait PreferredCleanerStore: Send + Sync {
    async fn find_link(&self, home_id: Uuid, cleaner_id: Uuid)
        -> Result<Option<PreferredCleanerLink>>;

    /// Insert a link; returns `false` when the pair already existed.
    /// Uniqueness on (home_id, cleaner_id) is enforced here, atomically.
    async fn insert_link(&self, home_id: Uuid, cleaner_id: Uuid, set_by: SetBy) -> Result<bool>;

    /// Remove a link; returns the number of rows removed (0 or 1).
    async fn delete_link(&self, home_id: Uuid, cleaner_id: Uuid) -> Result<u64>;

    /// The home's use-preferred-cleaners toggle; `None` for unknown homes.
    async fn home_uses_preferred(&self, home_id: Uuid) -> Result<Option<bool>>;

    async fn cleaner_contact(&self, cleaner_id: Uuid) -> Result<Option<CleanerContact>>;
}

// =============================================================================
// Postgres store
// =============================================================================

pub struct PgPreferredCleanerStore {
    pool: PgPool,
}

impl PgPreferredCleanerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferredCleanerStore for PgPreferredCleanerStore {
    async fn find_link(
        &self,
        home_id: Uuid,
        cleaner_id: Uuid,
    ) -> Result<Option<PreferredCleanerLink>> {
        queries::preferred_cleaner::find_link(&self.pool, home_id, cleaner_id).await
    }

    async fn insert_link(&self, home_id: Uuid, cleaner_id: Uuid, set_by: SetBy) -> Result<bool> {
        queries::preferred_cleaner::insert_link(&self.pool, home_id, cleaner_id, set_by).await
    }

    async fn delete_link(&self, home_id: Uuid, cleaner_id: Uuid) -> Result<u64> {
        queries::preferred_cleaner::delete_link(&self.pool, home_id, cleaner_id).await
    }

    async fn home_uses_preferred(&self, home_id: Uuid) -> Result<Option<bool>> {
        queries::home::uses_preferred_cleaners(&self.pool, home_id).await
    }

    async fn cleaner_contact(&self, cleaner_id: Uuid) -> Result<Option<CleanerContact>> {
        let cleaner = queries::cleaner::get_cleaner(&self.pool, cleaner_id).await?;
        Ok(cleaner.map(|c| CleanerContact {
            name: c.name,
            email: c.email,
            push_token: c.push_token,
        }))
    }
}

// =============================================================================
// Registry
// =============================================================================

pub struct PreferredCleanerRegistry {
    store: Arc<dyn PreferredCleanerStore>,
    email: Arc<dyn EmailSender>,
    push: Arc<dyn PushSender>,
}

impl PreferredCleanerRegistry {
    pub fn new(
        store: Arc<dyn PreferredCleanerStore>,
        email: Arc<dyn EmailSender>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self { store, email, push }
    }

    /// True iff a link exists for the pair AND the home's toggle is on.
    /// A home with the toggle off always reports false; its stored links are
    /// inert, not deleted. Unknown homes report false.
    pub async fn is_preferred(&self, home_id: Uuid, cleaner_id: Uuid) -> Result<bool> {
        match self.store.home_uses_preferred(home_id).await? {
            Some(true) => {}
            Some(false) | None => return Ok(false),
        }
        Ok(self.store.find_link(home_id, cleaner_id).await?.is_some())
    }

    /// Idempotent. Returns `true` when a link was actually created.
    /// The designation notification fires at most once, only on a genuine
    /// insert, and never fails the call — the link write is authoritative,
    /// notification advisory.
    pub async fn set_preferred(
        &self,
        home_id: Uuid,
        cleaner_id: Uuid,
        set_by: SetBy,
    ) -> Result<bool> {
        if self.store.find_link(home_id, cleaner_id).await?.is_some() {
            debug!(%home_id, %cleaner_id, "already preferred — no-op");
            return Ok(false);
        }

        let inserted = self.store.insert_link(home_id, cleaner_id, set_by).await?;
        if inserted {
            self.notify_designated(home_id, cleaner_id).await;
        }
        Ok(inserted)
    }

    /// Idempotent removal; returns `true` when a link was actually removed.
    pub async fn unset_preferred(&self, home_id: Uuid, cleaner_id: Uuid) -> Result<bool> {
        let removed = self.store.delete_link(home_id, cleaner_id).await?;
        if removed > 0 {
            debug!(%home_id, %cleaner_id, "preferred link removed");
        }
        Ok(removed > 0)
    }

    async fn notify_designated(&self, home_id: Uuid, cleaner_id: Uuid) {
        let contact = match self.store.cleaner_contact(cleaner_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(%cleaner_id, "preferred cleaner has no profile — skipping notification");
                return;
            }
            Err(e) => {
                warn!(%cleaner_id, error = %e, "could not load cleaner contact — skipping notification");
                return;
            }
        };

        if let Some(email) = &contact.email {
            let msg = PreferredCleanerEmail {
                to: email,
                cleaner_name: &contact.name,
            }
            .render();
            if let Err(e) = self.email.send(msg).await {
                warn!(%cleaner_id, error = %e, "preferred-designation email failed");
            }
        }

        if let Some(token) = &contact.push_token {
            let push = PushMessage {
                title: "You're a preferred cleaner!".to_string(),
                body: "A client added you as their preferred cleaner. Your job requests at their home now book instantly.".to_string(),
                data: json!({
                    "type": NOTIFICATION_PREFERRED_ADDED,
                    "homeId": home_id,
                }),
            };
            if let Err(e) = self.push.send(token, push).await {
                warn!(%cleaner_id, error = %e, "preferred-designation push failed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email_sender::FakeEmailSender;
    use crate::services::push_sender::FakePushSender;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory store: the mutex makes `insert_link` atomic, standing in for
    /// the database unique index.
    #[derive(Default)]
    struct InMemoryStore {
        homes: Mutex<HashMap<Uuid, bool>>,
        links: Mutex<HashMap<(Uuid, Uuid), PreferredCleanerLink>>,
        contacts: Mutex<HashMap<Uuid, CleanerContact>>,
    }

    impl InMemoryStore {
        fn with_home(self, home_id: Uuid, uses_preferred: bool) -> Self {
            self.homes.lock().insert(home_id, uses_preferred);
            self
        }

        fn with_contact(self, cleaner_id: Uuid, contact: CleanerContact) -> Self {
            self.contacts.lock().insert(cleaner_id, contact);
            self
        }

        fn link_count(&self) -> usize {
            self.links.lock().len()
        }
    }

    #[async_trait]
    impl PreferredCleanerStore for InMemoryStore {
        async fn find_link(
            &self,
            home_id: Uuid,
            cleaner_id: Uuid,
        ) -> Result<Option<PreferredCleanerLink>> {
            Ok(self.links.lock().get(&(home_id, cleaner_id)).cloned())
        }

        async fn insert_link(
            &self,
            home_id: Uuid,
            cleaner_id: Uuid,
            set_by: SetBy,
        ) -> Result<bool> {
            let mut links = self.links.lock();
            if links.contains_key(&(home_id, cleaner_id)) {
                return Ok(false);
            }
            links.insert(
                (home_id, cleaner_id),
                PreferredCleanerLink {
                    id: Uuid::new_v4(),
                    home_id,
                    cleaner_id,
                    set_by,
                    set_at: Utc::now(),
                },
            );
            Ok(true)
        }

        async fn delete_link(&self, home_id: Uuid, cleaner_id: Uuid) -> Result<u64> {
            Ok(self.links.lock().remove(&(home_id, cleaner_id)).is_some() as u64)
        }

        async fn home_uses_preferred(&self, home_id: Uuid) -> Result<Option<bool>> {
            Ok(self.homes.lock().get(&home_id).copied())
        }

        async fn cleaner_contact(&self, cleaner_id: Uuid) -> Result<Option<CleanerContact>> {
            Ok(self.contacts.lock().get(&cleaner_id).cloned())
        }
    }

    fn contact_with_everything() -> CleanerContact {
        CleanerContact {
            name: "Dana".to_string(),
            email: Some("dana@example.com".to_string()),
            push_token: Some("ExponentPushToken[abc]".to_string()),
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        email: Arc<FakeEmailSender>,
        push: Arc<FakePushSender>,
        registry: PreferredCleanerRegistry,
    }

    fn harness(store: InMemoryStore) -> Harness {
        let store = Arc::new(store);
        let email = Arc::new(FakeEmailSender::new());
        let push = Arc::new(FakePushSender::new());
        let registry = PreferredCleanerRegistry::new(
            Arc::clone(&store) as Arc<dyn PreferredCleanerStore>,
            Arc::clone(&email) as Arc<dyn EmailSender>,
            Arc::clone(&push) as Arc<dyn PushSender>,
        );
        Harness { store, email, push, registry }
    }

    #[tokio::test]
    async fn test_set_preferred_creates_link_and_notifies_once() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(cleaner_id, contact_with_everything()),
        );

        let created = h.registry.set_preferred(home_id, cleaner_id, SetBy::Review).await.unwrap();

        assert!(created);
        assert_eq!(h.store.link_count(), 1);
        assert_eq!(h.email.sent_messages().len(), 1);
        assert_eq!(h.push.sent_messages().len(), 1);
        assert!(h.registry.is_preferred(home_id, cleaner_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_preferred_is_idempotent() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(cleaner_id, contact_with_everything()),
        );

        assert!(h.registry.set_preferred(home_id, cleaner_id, SetBy::Manual).await.unwrap());
        assert!(!h.registry.set_preferred(home_id, cleaner_id, SetBy::Manual).await.unwrap());

        assert_eq!(h.store.link_count(), 1);
        // Second call fired no further notifications
        assert_eq!(h.email.sent_messages().len(), 1);
        assert_eq!(h.push.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_off_home_reports_not_preferred() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, false)
                .with_contact(cleaner_id, contact_with_everything()),
        );

        // Link exists, but the toggle makes it inert
        h.registry.set_preferred(home_id, cleaner_id, SetBy::Manual).await.unwrap();
        assert_eq!(h.store.link_count(), 1);

        assert!(!h.registry.is_preferred(home_id, cleaner_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_home_reports_not_preferred() {
        let h = harness(InMemoryStore::default());
        assert!(!h.registry.is_preferred(Uuid::new_v4(), Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unset_preferred_is_idempotent() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(cleaner_id, contact_with_everything()),
        );

        h.registry.set_preferred(home_id, cleaner_id, SetBy::Review).await.unwrap();
        assert!(h.registry.unset_preferred(home_id, cleaner_id).await.unwrap());
        // Removing again is a no-op, not an error
        assert!(!h.registry.unset_preferred(home_id, cleaner_id).await.unwrap());
        assert_eq!(h.store.link_count(), 0);
    }

    #[tokio::test]
    async fn test_notification_skipped_without_contact_details() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(
                    cleaner_id,
                    CleanerContact { name: "Dana".to_string(), email: None, push_token: None },
                ),
        );

        let created = h.registry.set_preferred(home_id, cleaner_id, SetBy::Review).await.unwrap();

        // The write still succeeds; there is just nothing to notify
        assert!(created);
        assert!(h.email.sent_messages().is_empty());
        assert!(h.push.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_the_write() {
        struct FailingEmail;

        #[async_trait]
        impl EmailSender for FailingEmail {
            async fn send(&self, _msg: crate::services::email_sender::EmailMessage) -> Result<()> {
                Err(anyhow::anyhow!("smtp down"))
            }
        }

        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let store = Arc::new(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(cleaner_id, contact_with_everything()),
        );
        let registry = PreferredCleanerRegistry::new(
            Arc::clone(&store) as Arc<dyn PreferredCleanerStore>,
            Arc::new(FailingEmail),
            Arc::new(FakePushSender::new()),
        );

        let created = registry.set_preferred(home_id, cleaner_id, SetBy::Review).await.unwrap();
        assert!(created, "write is authoritative, notification advisory");
        assert_eq!(store.link_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_set_preferred_leaves_exactly_one_link() {
        let home_id = Uuid::new_v4();
        let cleaner_id = Uuid::new_v4();
        let h = harness(
            InMemoryStore::default()
                .with_home(home_id, true)
                .with_contact(cleaner_id, contact_with_everything()),
        );
        let registry = Arc::new(h.registry);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.set_preferred(home_id, cleaner_id, SetBy::Review).await
            }));
        }

        let mut created_count = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                created_count += 1;
            }
        }

        assert_eq!(created_count, 1, "exactly one call observed the insert");
        assert_eq!(h.store.link_count(), 1);
        assert_eq!(h.email.sent_messages().len(), 1, "side effects fired once");
        assert_eq!(h.push.sent_messages().len(), 1);
    }
}
