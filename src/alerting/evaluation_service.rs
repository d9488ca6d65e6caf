use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::db::enums::{ComparisonOperator, MetricType};
use crate::db::models::AlertThreshold;
use crate::db::services::{alert_service, threshold_service};
use crate::metrics::aggregator::ServiceAggregate;
use crate::notifications::service::NotificationService;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Database query error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Threshold {0} has unknown metric type '{1}'")]
    UnknownMetricType(i32, String),
    #[error("Threshold {0} has unknown comparison operator '{1}'")]
    UnknownOperator(i32, String),
}

/// Evaluates enabled thresholds against the latest cycle's aggregates and
/// drives the alert lifecycle on trips.
pub struct EvaluationService {
    pool: PgPool,
    notification_service: Arc<NotificationService>,
}

/// Cooldown gate: a threshold that fired within its cooldown window is
/// skipped outright, which is what stops a sustained breach from producing an
/// alert storm.
fn in_cooldown(
    last_triggered_at: Option<DateTime<Utc>>,
    cooldown_minutes: i32,
    now: DateTime<Utc>,
) -> bool {
    match last_triggered_at {
        Some(last) => now < last + ChronoDuration::minutes(cooldown_minutes as i64),
        None => false,
    }
}

/// The value a threshold compares against, computed from one aggregate.
fn current_value(metric_type: MetricType, aggregate: &ServiceAggregate) -> f64 {
    let rate = |count: i64| -> f64 {
        if aggregate.requests_total == 0 {
            0.0
        } else {
            count as f64 / aggregate.requests_total as f64 * 100.0
        }
    };
    match metric_type {
        MetricType::Errors4xxRate => rate(aggregate.errors_4xx),
        MetricType::Errors5xxRate => rate(aggregate.errors_5xx),
        MetricType::ErrorTotalRate => rate(aggregate.errors_4xx + aggregate.errors_5xx),
        MetricType::LatencyAvg => aggregate.avg_latency_ms as f64,
        MetricType::RequestsPerSecond => aggregate.requests_per_second,
    }
}

fn trip_message(threshold: &AlertThreshold, service_name: &str, current: f64) -> String {
    format!(
        "ALERT! Threshold '{}' triggered for service '{}': {} {} {} (current: {:.2}).",
        threshold.name,
        service_name,
        threshold.metric_type,
        threshold.comparison_operator,
        threshold.threshold_value,
        current
    )
}

impl EvaluationService {
    pub fn new(pool: PgPool, notification_service: Arc<NotificationService>) -> Self {
        Self {
            pool,
            notification_service,
        }
    }

    /// Evaluates every enabled threshold against the aggregates of the cycle
    /// that just completed. Returns the number of alerts created.
    ///
    /// A failure on one threshold is logged and does not stop the others.
    pub async fn evaluate_cycle(
        &self,
        aggregates: &[ServiceAggregate],
    ) -> Result<usize, EvaluationError> {
        let thresholds = threshold_service::get_enabled_thresholds(&self.pool).await?;
        debug!(count = thresholds.len(), "Enabled thresholds to evaluate.");

        let now = Utc::now();
        let mut tripped = 0usize;
        for threshold in thresholds {
            match self.evaluate_threshold(&threshold, aggregates, now).await {
                Ok(count) => tripped += count,
                Err(e) => {
                    error!(threshold_id = threshold.id, threshold_name = %threshold.name, error = %e,
                        "Error evaluating threshold.");
                }
            }
        }
        Ok(tripped)
    }

    async fn evaluate_threshold(
        &self,
        threshold: &AlertThreshold,
        aggregates: &[ServiceAggregate],
        now: DateTime<Utc>,
    ) -> Result<usize, EvaluationError> {
        if in_cooldown(threshold.last_triggered_at, threshold.cooldown_minutes, now) {
            debug!(
                threshold_id = threshold.id,
                threshold_name = %threshold.name,
                cooldown_minutes = threshold.cooldown_minutes,
                "Threshold is in cooldown."
            );
            return Ok(0);
        }

        let metric_type = threshold.metric_type.parse::<MetricType>().map_err(|_| {
            EvaluationError::UnknownMetricType(threshold.id, threshold.metric_type.clone())
        })?;
        let operator = threshold
            .comparison_operator
            .parse::<ComparisonOperator>()
            .map_err(|_| {
                EvaluationError::UnknownOperator(
                    threshold.id,
                    threshold.comparison_operator.clone(),
                )
            })?;

        let candidates: Vec<&ServiceAggregate> = match &threshold.service_name {
            // A named service with no aggregate this cycle is simply quiet.
            Some(name) => aggregates
                .iter()
                .filter(|a| a.service_name == *name)
                .collect(),
            None => aggregates.iter().collect(),
        };

        let mut tripped = 0usize;
        let mut claimed = false;
        for aggregate in candidates {
            let current = current_value(metric_type, aggregate);
            if !operator.compare(current, threshold.threshold_value) {
                continue;
            }

            if !claimed {
                // Claim the cooldown window before creating the alert; a
                // concurrent collector instance losing this compare-and-set
                // must not produce a duplicate.
                let won = threshold_service::mark_triggered(
                    &self.pool,
                    threshold.id,
                    threshold.last_triggered_at,
                    now,
                )
                .await?;
                if !won {
                    warn!(
                        threshold_id = threshold.id,
                        "Another collector claimed this trip; skipping."
                    );
                    return Ok(tripped);
                }
                claimed = true;
            }

            let message = trip_message(threshold, &aggregate.service_name, current);
            match alert_service::create_alert(
                &self.pool,
                threshold,
                &aggregate.service_name,
                current,
                &message,
            )
            .await
            {
                Ok(alert) => {
                    info!(
                        threshold_id = threshold.id,
                        alert_id = alert.id,
                        service_name = %aggregate.service_name,
                        current_value = current,
                        "Alert threshold tripped. Dispatching notifications."
                    );
                    self.notification_service
                        .dispatch_for_alert(&alert, threshold)
                        .await;
                    tripped += 1;
                }
                Err(e) => {
                    // Isolate the pair: the remaining services still evaluate.
                    error!(threshold_id = threshold.id, service_name = %aggregate.service_name,
                        error = %e, "Failed to record alert.");
                }
            }
        }
        Ok(tripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn aggregate(requests: i64, e4: i64, e5: i64, latency: i64, rps: f64) -> ServiceAggregate {
        ServiceAggregate {
            service_name: "web".to_string(),
            requests_total: requests,
            errors_4xx: e4,
            errors_5xx: e5,
            avg_latency_ms: latency,
            requests_per_second: rps,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn rates_are_percentages_of_total_requests() {
        let a = aggregate(200, 10, 4, 120, 3.5);
        assert_eq!(current_value(MetricType::Errors4xxRate, &a), 5.0);
        assert_eq!(current_value(MetricType::Errors5xxRate, &a), 2.0);
        assert_eq!(current_value(MetricType::ErrorTotalRate, &a), 7.0);
        assert_eq!(current_value(MetricType::LatencyAvg, &a), 120.0);
        assert_eq!(current_value(MetricType::RequestsPerSecond, &a), 3.5);
    }

    #[test]
    fn rates_are_zero_when_no_requests_were_seen() {
        let a = aggregate(0, 0, 0, 0, 0.0);
        assert_eq!(current_value(MetricType::Errors4xxRate, &a), 0.0);
        assert_eq!(current_value(MetricType::ErrorTotalRate, &a), 0.0);
    }

    #[test]
    fn threshold_in_cooldown_is_suppressed() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let five_minutes_ago = now - ChronoDuration::minutes(5);
        assert!(in_cooldown(Some(five_minutes_ago), 15, now));
    }

    #[test]
    fn cooldown_expires_and_never_applies_to_fresh_thresholds() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let twenty_minutes_ago = now - ChronoDuration::minutes(20);
        assert!(!in_cooldown(Some(twenty_minutes_ago), 15, now));
        assert!(!in_cooldown(None, 15, now));
    }

    #[test]
    fn trip_message_names_the_rule_service_and_values() {
        let threshold = AlertThreshold {
            id: 1,
            name: "High 5xx".to_string(),
            service_name: Some("web".to_string()),
            metric_type: "errors_5xx_rate".to_string(),
            comparison_operator: "gte".to_string(),
            threshold_value: 5.0,
            window_minutes: 5,
            is_enabled: true,
            notify_email: true,
            notify_webhook: false,
            webhook_url: None,
            cooldown_minutes: 15,
            last_triggered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let message = trip_message(&threshold, "web", 12.5);
        assert!(message.contains("High 5xx"));
        assert!(message.contains("'web'"));
        assert!(message.contains("errors_5xx_rate gte 5"));
        assert!(message.contains("12.50"));
    }
}
