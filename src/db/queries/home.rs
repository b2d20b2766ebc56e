//! Home database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Home;

/// Get a home by ID
pub async fn get_home(pool: &PgPool, id: Uuid) -> Result<Option<Home>> {
    let home = sqlx::query_as::<_, Home>(
        r#"
        SELECT
            id, owner_id, street, city, postal_code,
            location_encrypted, use_preferred_cleaners,
            created_at, updated_at
        FROM homes
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(home)
}

/// The home's use-preferred-cleaners toggle; `None` for unknown homes
pub async fn uses_preferred_cleaners(pool: &PgPool, id: Uuid) -> Result<Option<bool>> {
    let flag: Option<bool> = sqlx::query_scalar(
        "SELECT use_preferred_cleaners FROM homes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(flag)
}
