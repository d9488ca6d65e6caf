use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Metric a threshold evaluates against the latest per-service aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Errors4xxRate,
    Errors5xxRate,
    ErrorTotalRate,
    LatencyAvg,
    RequestsPerSecond,
}

impl FromStr for MetricType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "errors_4xx_rate" => Ok(MetricType::Errors4xxRate),
            "errors_5xx_rate" => Ok(MetricType::Errors5xxRate),
            "error_total_rate" => Ok(MetricType::ErrorTotalRate),
            "latency_avg" => Ok(MetricType::LatencyAvg),
            "requests_per_second" => Ok(MetricType::RequestsPerSecond),
            _ => Err(()),
        }
    }
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Errors4xxRate => "errors_4xx_rate",
            MetricType::Errors5xxRate => "errors_5xx_rate",
            MetricType::ErrorTotalRate => "error_total_rate",
            MetricType::LatencyAvg => "latency_avg",
            MetricType::RequestsPerSecond => "requests_per_second",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

impl FromStr for ComparisonOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(ComparisonOperator::Gt),
            "lt" => Ok(ComparisonOperator::Lt),
            "gte" => Ok(ComparisonOperator::Gte),
            "lte" => Ok(ComparisonOperator::Lte),
            "eq" => Ok(ComparisonOperator::Eq),
            _ => Err(()),
        }
    }
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Eq => "eq",
        }
    }

    /// Applies the operator between a current value and the threshold value.
    pub fn compare(&self, current: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::Gt => current > threshold,
            ComparisonOperator::Lt => current < threshold,
            ComparisonOperator::Gte => current >= threshold,
            ComparisonOperator::Lte => current <= threshold,
            ComparisonOperator::Eq => (current - threshold).abs() < f64::EPSILON,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an alert record. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl FromStr for AlertStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triggered" => Ok(AlertStatus::Triggered),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(()),
        }
    }
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Triggered => "triggered",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::Triggered, AlertStatus::Acknowledged)
                | (AlertStatus::Triggered, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery channel recorded in the notification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationProvider {
    Owner,
    Telegram,
    Slack,
    Webhook,
}

impl NotificationProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationProvider::Owner => "owner",
            NotificationProvider::Telegram => "telegram",
            NotificationProvider::Slack => "slack",
            NotificationProvider::Webhook => "webhook",
        }
    }
}

impl fmt::Display for NotificationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Time window selector for trend queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendPeriod {
    Hour,
    Day,
    Week,
}

impl FromStr for TrendPeriod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TrendPeriod::Hour),
            "day" => Ok(TrendPeriod::Day),
            "week" => Ok(TrendPeriod::Week),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gt_is_strict_and_gte_is_inclusive() {
        assert!(!ComparisonOperator::Gt.compare(5.0, 5.0));
        assert!(ComparisonOperator::Gte.compare(5.0, 5.0));
        assert!(ComparisonOperator::Gt.compare(5.1, 5.0));
    }

    #[test]
    fn eq_uses_epsilon_compare() {
        assert!(ComparisonOperator::Eq.compare(3.0, 3.0));
        assert!(!ComparisonOperator::Eq.compare(3.01, 3.0));
    }

    #[test]
    fn resolved_is_terminal() {
        assert!(AlertStatus::Triggered.can_transition_to(AlertStatus::Acknowledged));
        assert!(AlertStatus::Triggered.can_transition_to(AlertStatus::Resolved));
        assert!(AlertStatus::Acknowledged.can_transition_to(AlertStatus::Resolved));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Triggered));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Acknowledged));
        assert!(!AlertStatus::Acknowledged.can_transition_to(AlertStatus::Triggered));
    }

    #[test]
    fn enum_round_trips_through_strings() {
        for m in [
            MetricType::Errors4xxRate,
            MetricType::Errors5xxRate,
            MetricType::ErrorTotalRate,
            MetricType::LatencyAvg,
            MetricType::RequestsPerSecond,
        ] {
            assert_eq!(m.as_str().parse::<MetricType>(), Ok(m));
        }
        assert!("cpu_usage".parse::<MetricType>().is_err());
    }
}
