use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::NotificationProvider;
use crate::db::models::{Alert, AlertThreshold};

/// Represents the different types of notification channel configurations.
/// This enum is serialized to JSON and encrypted before being stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelConfig {
    Telegram {
        bot_token: String,
        chat_id: String,
    },
    Slack {
        webhook_url: String,
    },
    Webhook {
        url: String,
        /// Optional JSON body template rendered with the alert context.
        body_template: Option<String>,
    },
}

impl ChannelConfig {
    pub fn channel_type(&self) -> &'static str {
        match self {
            ChannelConfig::Telegram { .. } => "telegram",
            ChannelConfig::Slack { .. } => "slack",
            ChannelConfig::Webhook { .. } => "webhook",
        }
    }

    pub fn provider(&self) -> NotificationProvider {
        match self {
            ChannelConfig::Telegram { .. } => NotificationProvider::Telegram,
            ChannelConfig::Slack { .. } => NotificationProvider::Slack,
            ChannelConfig::Webhook { .. } => NotificationProvider::Webhook,
        }
    }
}

/// Everything a channel needs to render its message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertContext {
    pub alert_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub service_name: String,
    pub metric_type: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub triggered_at: DateTime<Utc>,
}

impl AlertContext {
    pub fn from_alert(alert: &Alert, threshold: &AlertThreshold) -> Self {
        Self {
            alert_id: Some(alert.id),
            title: format!("Alert: {}", threshold.name),
            message: alert.message.clone(),
            service_name: alert.service_name.clone(),
            metric_type: alert.metric_type.clone(),
            current_value: alert.current_value,
            threshold_value: alert.threshold_value,
            triggered_at: alert.created_at,
        }
    }

    /// A synthetic context used when an operator test-fires a channel.
    pub fn test_message(channel_name: &str) -> Self {
        Self {
            alert_id: None,
            title: "Test notification".to_string(),
            message: format!("This is a test message from channel '{channel_name}'."),
            service_name: "test".to_string(),
            metric_type: "latency_avg".to_string(),
            current_value: 0.0,
            threshold_value: 0.0,
            triggered_at: Utc::now(),
        }
    }
}

/// Per-channel outcome of one dispatch. Persisted to the notification log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub provider: NotificationProvider,
    pub success: bool,
    pub error: Option<String>,
    pub message_id: Option<String>,
}

impl NotificationResult {
    pub fn ok(provider: NotificationProvider, message_id: Option<String>) -> Self {
        Self {
            provider,
            success: true,
            error: None,
            message_id,
        }
    }

    pub fn failed(provider: NotificationProvider, error: impl Into<String>) -> Self {
        Self {
            provider,
            success: false,
            error: Some(error.into()),
            message_id: None,
        }
    }
}

/// API request body for creating a new notification channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub name: String,
    /// The raw tagged config JSON; validated into `ChannelConfig` before storage.
    pub config: serde_json::Value,
    pub is_enabled: Option<bool>,
}

/// API request body for updating an existing notification channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_enabled: Option<bool>,
}

/// API response for a single notification channel.
/// Note: this does NOT include the stored credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
    pub is_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_config_round_trips_tagged_json() {
        let config = ChannelConfig::Telegram {
            bot_token: "123:abc".to_string(),
            chat_id: "-100200".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""type":"telegram"#));
        assert_eq!(serde_json::from_str::<ChannelConfig>(&json).unwrap(), config);
    }

    #[test]
    fn unknown_channel_kind_fails_validation() {
        let raw = r#"{"type":"pager","routingKey":"x"}"#;
        assert!(serde_json::from_str::<ChannelConfig>(raw).is_err());
    }
}
