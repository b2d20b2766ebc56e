//! Cleaner database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Cleaner;

const CLEANER_COLUMNS: &str = r#"
    id, name, email, user_type, is_frozen,
    service_area_latitude, service_area_longitude, service_area_radius_miles,
    notification_preferences, push_token,
    is_business_owner, business_verification_status, business_highlight_opt_in,
    locked_until, created_at, updated_at
"#;

/// Get a cleaner by ID
pub async fn get_cleaner(pool: &PgPool, id: Uuid) -> Result<Option<Cleaner>> {
    let cleaner = sqlx::query_as::<_, Cleaner>(&format!(
        "SELECT {CLEANER_COLUMNS} FROM cleaners WHERE id = $1",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(cleaner)
}

/// All cleaners eligible for dispatch consideration.
///
/// The filter runs in SQL — dispatch scans every active cleaner, so shipping
/// the whole table to the worker and filtering in memory does not scale.
/// Coordinate parsing still happens in the finder: the columns are free-form
/// strings and bad values must skip a candidate, not fail the query.
pub async fn list_dispatchable_cleaners(pool: &PgPool) -> Result<Vec<Cleaner>> {
    let cleaners = sqlx::query_as::<_, Cleaner>(&format!(
        r#"
        SELECT {CLEANER_COLUMNS}
        FROM cleaners
        WHERE user_type = 'cleaner'
          AND NOT is_frozen
          AND service_area_latitude IS NOT NULL
          AND service_area_longitude IS NOT NULL
        "#,
    ))
    .fetch_all(pool)
    .await?;

    Ok(cleaners)
}
