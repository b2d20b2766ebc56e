//! Preferred-cleaner link types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// How a preferred link came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "preferred_set_by", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SetBy {
    /// Created by a homeowner review carrying the set-as-preferred flag
    Review,
    /// Created by an explicit homeowner management action
    Manual,
}

/// A homeowner's designation of a cleaner as preferred for one home.
/// At most one link per (home, cleaner) pair — unique index in the schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PreferredCleanerLink {
    pub id: Uuid,
    pub home_id: Uuid,
    pub cleaner_id: Uuid,
    pub set_by: SetBy,
    pub set_at: DateTime<Utc>,
}

/// brightnest.preferred.set / brightnest.preferred.unset payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredPairPayload {
    pub home_id: Uuid,
    pub cleaner_id: Uuid,
}

/// Reply to preferred.set / preferred.unset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredChangeResponse {
    pub home_id: Uuid,
    pub cleaner_id: Uuid,
    /// False when the call was an idempotent no-op
    pub changed: bool,
}

/// Reply to brightnest.preferred.check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredCheckResponse {
    pub home_id: Uuid,
    pub cleaner_id: Uuid,
    pub preferred: bool,
}
