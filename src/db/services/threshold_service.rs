use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::enums::{ComparisonOperator, MetricType};
use crate::db::models::AlertThreshold;
use crate::web::error::AppError;
use crate::web::models::threshold_models::{CreateThresholdRequest, UpdateThresholdRequest};

fn validate_metric_type(metric_type: &str) -> Result<(), AppError> {
    metric_type
        .parse::<MetricType>()
        .map(|_| ())
        .map_err(|_| AppError::InvalidInput(format!("Unknown metric type: {metric_type}")))
}

fn validate_operator(operator: &str) -> Result<(), AppError> {
    operator
        .parse::<ComparisonOperator>()
        .map(|_| ())
        .map_err(|_| AppError::InvalidInput(format!("Unknown comparison operator: {operator}")))
}

pub async fn create_threshold(
    pool: &PgPool,
    payload: CreateThresholdRequest,
) -> Result<AlertThreshold, AppError> {
    validate_metric_type(&payload.metric_type)?;
    validate_operator(&payload.comparison_operator)?;
    if payload.notify_webhook.unwrap_or(false) && payload.webhook_url.is_none() {
        return Err(AppError::InvalidInput(
            "webhookUrl is required when notifyWebhook is set".to_string(),
        ));
    }

    let now = Utc::now();
    let threshold = sqlx::query_as::<_, AlertThreshold>(
        r#"
        INSERT INTO alert_thresholds
            (name, service_name, metric_type, comparison_operator, threshold_value,
             window_minutes, is_enabled, notify_email, notify_webhook, webhook_url,
             cooldown_minutes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.service_name)
    .bind(&payload.metric_type)
    .bind(&payload.comparison_operator)
    .bind(payload.threshold_value)
    .bind(payload.window_minutes.unwrap_or(5))
    .bind(payload.is_enabled.unwrap_or(true))
    .bind(payload.notify_email.unwrap_or(false))
    .bind(payload.notify_webhook.unwrap_or(false))
    .bind(&payload.webhook_url)
    .bind(payload.cooldown_minutes.unwrap_or(15))
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(threshold)
}

pub async fn get_all_thresholds(pool: &PgPool) -> Result<Vec<AlertThreshold>, AppError> {
    let thresholds =
        sqlx::query_as::<_, AlertThreshold>("SELECT * FROM alert_thresholds ORDER BY name")
            .fetch_all(pool)
            .await?;
    Ok(thresholds)
}

pub async fn get_threshold_by_id(pool: &PgPool, id: i32) -> Result<AlertThreshold, AppError> {
    sqlx::query_as::<_, AlertThreshold>("SELECT * FROM alert_thresholds WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert threshold not found".to_string()))
}

pub async fn update_threshold(
    pool: &PgPool,
    id: i32,
    payload: UpdateThresholdRequest,
) -> Result<AlertThreshold, AppError> {
    let current = get_threshold_by_id(pool, id).await?;

    let name = payload.name.unwrap_or(current.name);
    // Double-Option fields: absent keeps the current value, explicit null clears it.
    let service_name = payload.service_name.unwrap_or(current.service_name);
    let metric_type = payload.metric_type.unwrap_or(current.metric_type);
    let comparison_operator = payload
        .comparison_operator
        .unwrap_or(current.comparison_operator);
    let threshold_value = payload.threshold_value.unwrap_or(current.threshold_value);
    let window_minutes = payload.window_minutes.unwrap_or(current.window_minutes);
    let notify_email = payload.notify_email.unwrap_or(current.notify_email);
    let notify_webhook = payload.notify_webhook.unwrap_or(current.notify_webhook);
    let webhook_url = payload.webhook_url.unwrap_or(current.webhook_url);
    let cooldown_minutes = payload.cooldown_minutes.unwrap_or(current.cooldown_minutes);

    validate_metric_type(&metric_type)?;
    validate_operator(&comparison_operator)?;
    if notify_webhook && webhook_url.is_none() {
        return Err(AppError::InvalidInput(
            "webhookUrl is required when notifyWebhook is set".to_string(),
        ));
    }

    let threshold = sqlx::query_as::<_, AlertThreshold>(
        r#"
        UPDATE alert_thresholds
        SET name = $2, service_name = $3, metric_type = $4, comparison_operator = $5,
            threshold_value = $6, window_minutes = $7, notify_email = $8,
            notify_webhook = $9, webhook_url = $10, cooldown_minutes = $11,
            updated_at = $12
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&name)
    .bind(&service_name)
    .bind(&metric_type)
    .bind(&comparison_operator)
    .bind(threshold_value)
    .bind(window_minutes)
    .bind(notify_email)
    .bind(notify_webhook)
    .bind(&webhook_url)
    .bind(cooldown_minutes)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(threshold)
}

pub async fn delete_threshold(pool: &PgPool, id: i32) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM alert_thresholds WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Alert threshold not found".to_string()));
    }
    Ok(())
}

pub async fn set_threshold_enabled(
    pool: &PgPool,
    id: i32,
    is_enabled: bool,
) -> Result<AlertThreshold, AppError> {
    sqlx::query_as::<_, AlertThreshold>(
        r#"
        UPDATE alert_thresholds
        SET is_enabled = $2, updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(is_enabled)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Alert threshold not found".to_string()))
}

/// Thresholds the rule engine evaluates each cycle.
pub async fn get_enabled_thresholds(pool: &PgPool) -> sqlx::Result<Vec<AlertThreshold>> {
    sqlx::query_as::<_, AlertThreshold>(
        "SELECT * FROM alert_thresholds WHERE is_enabled = TRUE ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

/// Compare-and-set of `last_triggered_at`. The previous value observed during
/// evaluation is part of the predicate so that concurrent collector instances
/// cannot both claim the same trip; the loser sees `false` and skips its
/// duplicate alert.
pub async fn mark_triggered(
    pool: &PgPool,
    id: i32,
    observed_last_triggered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE alert_thresholds
        SET last_triggered_at = $2, updated_at = $2
        WHERE id = $1 AND last_triggered_at IS NOT DISTINCT FROM $3
        "#,
    )
    .bind(id)
    .bind(now)
    .bind(observed_last_triggered_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
