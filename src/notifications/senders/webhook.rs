use async_trait::async_trait;
use reqwest::{header, Client};
use tera::Tera;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{AlertContext, ChannelConfig};

/// A sender for pushing notifications to a subscriber-defined webhook.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn render_body(
    context: &AlertContext,
    body_template: Option<&str>,
) -> Result<String, SenderError> {
    match body_template {
        Some(template) => {
            let mut tera_context = tera::Context::new();
            tera_context.insert("title", &context.title);
            tera_context.insert("message", &context.message);
            tera_context.insert("service_name", &context.service_name);
            tera_context.insert("metric_type", &context.metric_type);
            tera_context.insert("current_value", &context.current_value);
            tera_context.insert("threshold_value", &context.threshold_value);
            tera_context.insert(
                "triggered_at",
                &context.triggered_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            );
            Tera::one_off(template, &tera_context, true)
                .map_err(|e| SenderError::TemplatingError(e.to_string()))
        }
        None => serde_json::to_string(context)
            .map_err(|e| SenderError::TemplatingError(e.to_string())),
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        context: &AlertContext,
    ) -> Result<Option<String>, SenderError> {
        let (url, body_template) = match config {
            ChannelConfig::Webhook { url, body_template } => (url, body_template.as_deref()),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Webhook config, but found a different type.".to_string(),
                ));
            }
        };

        let body = render_body(context, body_template)?;

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context() -> AlertContext {
        AlertContext {
            alert_id: Some(3),
            title: "Alert: error rate".to_string(),
            message: "4xx rate above threshold".to_string(),
            service_name: "web".to_string(),
            metric_type: "errors_4xx_rate".to_string(),
            current_value: 8.25,
            threshold_value: 5.0,
            triggered_at: Utc::now(),
        }
    }

    #[test]
    fn default_body_is_the_structured_context() {
        let body = render_body(&context(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["serviceName"], "web");
        assert_eq!(value["currentValue"], 8.25);
    }

    #[test]
    fn template_body_renders_context_variables() {
        let body = render_body(
            &context(),
            Some(r#"{"text": "{{ service_name }}: {{ current_value }}"}"#),
        )
        .unwrap();
        assert_eq!(body, r#"{"text": "web: 8.25"}"#);
    }

    #[test]
    fn broken_template_is_a_templating_error() {
        let result = render_body(&context(), Some("{{ unclosed"));
        assert!(matches!(result, Err(SenderError::TemplatingError(_))));
    }
}
