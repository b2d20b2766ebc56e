//! Appointment database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Appointment;

const APPOINTMENT_COLUMNS: &str = r#"
    id, home_id, scheduled_date, start_time, price_cents, status,
    assigned_cleaner_ids, last_minute_notifications_sent_at,
    created_at, updated_at
"#;

/// Get an appointment by ID
pub async fn get_appointment(pool: &PgPool, id: Uuid) -> Result<Option<Appointment>> {
    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(appointment)
}

/// Assign a cleaner directly: mark the appointment assigned and append the
/// cleaner to its assigned list. Appending twice is a no-op.
pub async fn assign_cleaner(
    pool: &PgPool,
    appointment_id: Uuid,
    cleaner_id: Uuid,
) -> Result<Option<Appointment>> {
    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        r#"
        UPDATE appointments
        SET status = 'assigned',
            assigned_cleaner_ids = CASE
                WHEN $2 = ANY(assigned_cleaner_ids) THEN assigned_cleaner_ids
                ELSE array_append(assigned_cleaner_ids, $2)
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {APPOINTMENT_COLUMNS}
        "#,
    ))
    .bind(appointment_id)
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await?;

    Ok(appointment)
}

/// Create a pending approval request from a cleaner.
///
/// Returns `false` when a request for this (appointment, requester) pair
/// already exists — the unique index makes a repeat request a no-op rather
/// than a duplicate row.
pub async fn create_pending_request(
    pool: &PgPool,
    appointment_id: Uuid,
    requester_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO appointment_requests (id, appointment_id, requester_id, status, created_at)
        VALUES ($1, $2, $3, 'pending', NOW())
        ON CONFLICT (appointment_id, requester_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(appointment_id)
    .bind(requester_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stamp the appointment with the time of an urgent dispatch run
pub async fn mark_last_minute_dispatched(
    pool: &PgPool,
    appointment_id: Uuid,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE appointments
        SET last_minute_notifications_sent_at = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(())
}
