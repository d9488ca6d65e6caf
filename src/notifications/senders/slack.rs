use async_trait::async_trait;
use reqwest::Client;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{AlertContext, ChannelConfig};

/// A sender for pushing notifications to a Slack-compatible incoming webhook.
pub struct SlackSender {
    client: Client,
}

impl SlackSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn attachment_payload(context: &AlertContext) -> serde_json::Value {
    serde_json::json!({
        "attachments": [{
            "color": "#d32f2f",
            "title": format!(":rotating_light: {}", context.title),
            "text": context.message,
            "fields": [
                { "title": "Service", "value": context.service_name, "short": true },
                { "title": "Metric", "value": context.metric_type, "short": true },
                { "title": "Current", "value": format!("{:.2}", context.current_value), "short": true },
                { "title": "Threshold", "value": format!("{:.2}", context.threshold_value), "short": true },
                {
                    "title": "At",
                    "value": context.triggered_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    "short": false
                },
            ],
        }]
    })
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        context: &AlertContext,
    ) -> Result<Option<String>, SenderError> {
        let webhook_url = match config {
            ChannelConfig::Slack { webhook_url } => webhook_url,
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Slack config, but found a different type.".to_string(),
                ));
            }
        };

        let response = self
            .client
            .post(webhook_url)
            .json(&attachment_payload(context))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Slack webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        // Incoming webhooks answer with a bare "ok"; there is no message id.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn payload_carries_attachment_fields() {
        let context = AlertContext {
            alert_id: Some(7),
            title: "Alert: latency".to_string(),
            message: "latency above threshold".to_string(),
            service_name: "api".to_string(),
            metric_type: "latency_avg".to_string(),
            current_value: 512.0,
            threshold_value: 250.0,
            triggered_at: Utc::now(),
        };
        let payload = attachment_payload(&context);
        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "#d32f2f");
        assert!(attachment["title"].as_str().unwrap().contains("Alert: latency"));
        assert_eq!(attachment["fields"][0]["value"], "api");
        assert_eq!(attachment["fields"][2]["value"], "512.00");
    }
}
