//! Preferred-cleaner link queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{PreferredCleanerLink, SetBy};

/// Find the link for a (home, cleaner) pair
pub async fn find_link(
    pool: &PgPool,
    home_id: Uuid,
    cleaner_id: Uuid,
) -> Result<Option<PreferredCleanerLink>> {
    let link = sqlx::query_as::<_, PreferredCleanerLink>(
        r#"
        SELECT id, home_id, cleaner_id, set_by, set_at
        FROM home_preferred_cleaners
        WHERE home_id = $1 AND cleaner_id = $2
        "#,
    )
    .bind(home_id)
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await?;

    Ok(link)
}

/// Insert a link for a (home, cleaner) pair.
///
/// Returns `false` when the pair already existed — the unique index absorbs
/// racing inserts, so callers can treat their own existence pre-check as an
/// optimization only.
pub async fn insert_link(
    pool: &PgPool,
    home_id: Uuid,
    cleaner_id: Uuid,
    set_by: SetBy,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO home_preferred_cleaners (id, home_id, cleaner_id, set_by, set_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (home_id, cleaner_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(home_id)
    .bind(cleaner_id)
    .bind(set_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove the link for a (home, cleaner) pair; returns rows removed (0 or 1)
pub async fn delete_link(pool: &PgPool, home_id: Uuid, cleaner_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM home_preferred_cleaners WHERE home_id = $1 AND cleaner_id = $2",
    )
    .bind(home_id)
    .bind(cleaner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
