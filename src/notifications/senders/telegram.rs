use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{NotificationSender, SenderError};
use crate::notifications::models::{AlertContext, ChannelConfig};

/// A sender for pushing notifications via the Telegram Bot API.
pub struct TelegramSender {
    client: Client,
}

impl TelegramSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for char_to_escape in text.chars() {
        match char_to_escape {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' => {
                escaped_text.push('\\');
                escaped_text.push(char_to_escape);
            }
            _ => {
                escaped_text.push(char_to_escape);
            }
        }
    }
    escaped_text
}

fn render_message(context: &AlertContext) -> String {
    format!(
        "\u{1F6A8} *{}*\n{}\n\nService: {}\nMetric: {}\nCurrent: {}\nThreshold: {}\nAt: {}",
        escape_markdown_v2(&context.title),
        escape_markdown_v2(&context.message),
        escape_markdown_v2(&context.service_name),
        escape_markdown_v2(&context.metric_type),
        escape_markdown_v2(&format!("{:.2}", context.current_value)),
        escape_markdown_v2(&format!("{:.2}", context.threshold_value)),
        escape_markdown_v2(
            &context
                .triggered_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        ),
    )
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    result: Option<TelegramResult>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct TelegramResult {
    message_id: i64,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        context: &AlertContext,
    ) -> Result<Option<String>, SenderError> {
        let (bot_token, chat_id) = match config {
            ChannelConfig::Telegram { bot_token, chat_id } => (bot_token, chat_id),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Telegram config, but found a different type.".to_string(),
                ));
            }
        };

        let api_url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");

        let text = render_message(context);
        let payload = TelegramMessage {
            chat_id,
            text: &text,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&api_url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        let body: TelegramResponse = response.json().await?;
        if !body.ok {
            return Err(SenderError::SendFailed(format!(
                "Telegram API rejected the message: {}",
                body.description.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        Ok(body.result.map(|r| r.message_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn escapes_all_reserved_characters() {
        assert_eq!(
            escape_markdown_v2("a_b*c[d]e(f)g.h!i-j"),
            r"a\_b\*c\[d\]e\(f\)g\.h\!i\-j"
        );
        assert_eq!(escape_markdown_v2("plain text"), "plain text");
    }

    #[test]
    fn rendered_message_keeps_bold_title_markers_unescaped() {
        let context = AlertContext {
            alert_id: Some(1),
            title: "Alert: 5xx spike".to_string(),
            message: "threshold breached".to_string(),
            service_name: "web".to_string(),
            metric_type: "errors_5xx_rate".to_string(),
            current_value: 12.5,
            threshold_value: 5.0,
            triggered_at: Utc::now(),
        };
        let text = render_message(&context);
        assert!(text.contains("*Alert: 5xx spike*"));
        assert!(text.contains(r"12\.50"));
        assert!(text.contains("Service: web"));
    }
}
