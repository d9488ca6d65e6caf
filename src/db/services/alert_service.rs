use chrono::Utc;
use sqlx::PgPool;

use crate::db::enums::AlertStatus;
use crate::db::models::{Alert, AlertThreshold};
use crate::web::error::AppError;

/// Inserts a new alert in the `triggered` state. The current and threshold
/// values are captured here and never touched again; editing the threshold
/// afterwards does not rewrite history.
pub async fn create_alert(
    pool: &PgPool,
    threshold: &AlertThreshold,
    service_name: &str,
    current_value: f64,
    message: &str,
) -> sqlx::Result<Alert> {
    sqlx::query_as::<_, Alert>(
        r#"
        INSERT INTO alerts
            (threshold_id, service_name, metric_type, current_value,
             threshold_value, status, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(threshold.id)
    .bind(service_name)
    .bind(&threshold.metric_type)
    .bind(current_value)
    .bind(threshold.threshold_value)
    .bind(AlertStatus::Triggered.as_str())
    .bind(message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn get_alert_by_id(pool: &PgPool, id: i32) -> Result<Alert, AppError> {
    sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert not found".to_string()))
}

pub async fn list_alerts(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<Alert>, AppError> {
    if let Some(status) = status {
        status
            .parse::<AlertStatus>()
            .map_err(|_| AppError::InvalidInput(format!("Unknown alert status: {status}")))?;
    }
    let alerts = sqlx::query_as::<_, Alert>(
        r#"
        SELECT * FROM alerts
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(alerts)
}

fn parse_status(alert: &Alert) -> Result<AlertStatus, AppError> {
    alert.status.parse::<AlertStatus>().map_err(|_| {
        AppError::InternalServerError(format!(
            "Alert {} has malformed status '{}'",
            alert.id, alert.status
        ))
    })
}

/// Marks a triggered alert as seen by an operator.
pub async fn acknowledge_alert(
    pool: &PgPool,
    id: i32,
    acknowledged_by_id: Option<i32>,
) -> Result<Alert, AppError> {
    let alert = get_alert_by_id(pool, id).await?;
    let status = parse_status(&alert)?;
    if !status.can_transition_to(AlertStatus::Acknowledged) {
        return Err(AppError::Conflict(format!(
            "Cannot acknowledge an alert in status '{status}'"
        )));
    }

    // Status is re-checked in the predicate so a concurrent resolve wins cleanly.
    sqlx::query_as::<_, Alert>(
        r#"
        UPDATE alerts
        SET status = $2, acknowledged_by_id = $3, acknowledged_at = $4
        WHERE id = $1 AND status = $5
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(AlertStatus::Acknowledged.as_str())
    .bind(acknowledged_by_id)
    .bind(Utc::now())
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Alert changed state concurrently".to_string()))
}

/// Closes an alert. Permitted from both `triggered` and `acknowledged`.
pub async fn resolve_alert(pool: &PgPool, id: i32) -> Result<Alert, AppError> {
    let alert = get_alert_by_id(pool, id).await?;
    let status = parse_status(&alert)?;
    if !status.can_transition_to(AlertStatus::Resolved) {
        return Err(AppError::Conflict(format!(
            "Cannot resolve an alert in status '{status}'"
        )));
    }

    sqlx::query_as::<_, Alert>(
        r#"
        UPDATE alerts
        SET status = $2, resolved_at = $3
        WHERE id = $1 AND status = $4
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(AlertStatus::Resolved.as_str())
    .bind(Utc::now())
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Alert changed state concurrently".to_string()))
}
