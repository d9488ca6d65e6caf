use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted per-service roll-up row.
/// Corresponds to the `service_aggregates` table (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAggregateRow {
    pub id: i64,
    pub service_name: String,
    pub requests_total: i64,
    pub errors_4xx: i64,
    pub errors_5xx: i64,
    pub avg_latency_ms: i64,
    pub requests_per_second: f64,
    pub collected_at: DateTime<Utc>,
}

/// An administrator-authored alerting rule.
/// Corresponds to the `alert_thresholds` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AlertThreshold {
    pub id: i32,
    pub name: String,
    /// None applies the rule to every service seen in the cycle.
    pub service_name: Option<String>,
    pub metric_type: String,
    pub comparison_operator: String,
    pub threshold_value: f64,
    pub window_minutes: i32,
    pub is_enabled: bool,
    pub notify_email: bool,
    pub notify_webhook: bool,
    pub webhook_url: Option<String>,
    pub cooldown_minutes: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One rule trip. `current_value` and `threshold_value` are snapshots taken
/// at trip time; threshold edits never rewrite them.
/// Corresponds to the `alerts` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i32,
    pub threshold_id: i32,
    pub service_name: String,
    pub metric_type: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_by_id: Option<i32>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A configured chat channel. `config` holds the AES-GCM-encrypted JSON of
/// the tagged channel configuration.
/// Corresponds to the `notification_channels` table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationChannel {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
    pub config: Vec<u8>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One delivery attempt for one channel.
/// Corresponds to the `notification_log` table (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub id: i64,
    pub alert_id: Option<i32>,
    pub provider: String,
    pub success: bool,
    pub error: Option<String>,
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An in-app inbox entry for the deployment owner. Written here, read by the
/// wiki UI.
/// Corresponds to the `owner_notifications` table (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerNotification {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
