use async_trait::async_trait;
use thiserror::Error;

use super::models::{AlertContext, ChannelConfig};

pub mod slack;
pub mod telegram;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// A trait for sending notifications to a specific channel type.
/// All concrete sender implementations (Telegram, Slack, Webhook) must
/// implement this trait.
#[async_trait]
pub trait NotificationSender {
    /// Sends a notification rendered from the alert context.
    ///
    /// Returns the remote message id when the channel's API yields one.
    async fn send(
        &self,
        config: &ChannelConfig,
        context: &AlertContext,
    ) -> Result<Option<String>, SenderError>;
}
