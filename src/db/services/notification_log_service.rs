use chrono::Utc;
use sqlx::PgPool;

use crate::db::models::{NotificationLogEntry, OwnerNotification};
use crate::notifications::models::NotificationResult;
use crate::web::error::AppError;

/// Appends one delivery-attempt row. Failures here are the caller's to log;
/// a lost log row must never fail a dispatch.
pub async fn record_attempt(
    pool: &PgPool,
    alert_id: Option<i32>,
    result: &NotificationResult,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notification_log (alert_id, provider, success, error, message_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(alert_id)
    .bind(result.provider.as_str())
    .bind(result.success)
    .bind(&result.error)
    .bind(&result.message_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_attempts(
    pool: &PgPool,
    alert_id: Option<i32>,
    limit: i64,
) -> Result<Vec<NotificationLogEntry>, AppError> {
    let entries = sqlx::query_as::<_, NotificationLogEntry>(
        r#"
        SELECT * FROM notification_log
        WHERE ($1::int IS NULL OR alert_id = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(alert_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Writes an entry to the deployment owner's in-app inbox.
pub async fn create_owner_notification(
    pool: &PgPool,
    title: &str,
    content: &str,
) -> sqlx::Result<OwnerNotification> {
    sqlx::query_as::<_, OwnerNotification>(
        r#"
        INSERT INTO owner_notifications (title, content, is_read, created_at)
        VALUES ($1, $2, FALSE, $3)
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}
