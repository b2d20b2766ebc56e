//! In-app notification queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{NewNotification, Notification};

/// Insert an in-app notification; returns the new row's ID
pub async fn create_notification(pool: &PgPool, notification: &NewNotification) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO notifications (
            id, cleaner_id, kind, action_required,
            appointment_id, home_id, price_cents, distance_miles,
            expires_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(notification.cleaner_id)
    .bind(&notification.kind)
    .bind(notification.action_required)
    .bind(notification.appointment_id)
    .bind(notification.home_id)
    .bind(notification.price_cents)
    .bind(notification.distance_miles)
    .bind(notification.expires_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Recent notifications for a cleaner, newest first, expired alerts excluded
pub async fn list_for_cleaner(
    pool: &PgPool,
    cleaner_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT
            id, cleaner_id, kind, action_required,
            appointment_id, home_id, price_cents, distance_miles,
            expires_at, read_at, created_at
        FROM notifications
        WHERE cleaner_id = $1
          AND (expires_at IS NULL OR expires_at > NOW())
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(cleaner_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// Mark a notification read; returns `false` when it was missing, owned by
/// someone else, or already read
pub async fn mark_read(pool: &PgPool, id: Uuid, cleaner_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET read_at = NOW()
        WHERE id = $1 AND cleaner_id = $2 AND read_at IS NULL
        "#,
    )
    .bind(id)
    .bind(cleaner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unread, unexpired notifications for a cleaner — drives the app badge
pub async fn unread_count(pool: &PgPool, cleaner_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM notifications
        WHERE cleaner_id = $1
          AND read_at IS NULL
          AND (expires_at IS NULL OR expires_at > NOW())
        "#,
    )
    .bind(cleaner_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
