//! Home types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A homeowner's property
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    pub id: Uuid,
    pub owner_id: Uuid,

    // Address
    pub street: String,
    pub city: String,
    pub postal_code: String,

    /// Encrypted "lat,lon" payload. Opaque to SQL; decoded through the
    /// `CoordinateCodec` capability only when dispatch needs coordinates.
    pub location_encrypted: Option<String>,

    /// When false, preferred-cleaner links for this home are inert: booking
    /// decisions treat them as absent, but the rows stay in place.
    pub use_preferred_cleaners: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
