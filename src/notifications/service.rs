use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use reqwest::Client;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};

use super::encryption::{EncryptionError, EncryptionService};
use super::models::{
    AlertContext, ChannelConfig, ChannelResponse, CreateChannelRequest, NotificationResult,
    UpdateChannelRequest,
};
use super::senders::{
    slack::SlackSender, telegram::TelegramSender, webhook::WebhookSender, NotificationSender,
    SenderError,
};
use crate::db::enums::NotificationProvider;
use crate::db::models::{Alert, AlertThreshold, NotificationChannel};
use crate::db::services::notification_log_service;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Encryption error: {0}")]
    EncryptionError(#[from] EncryptionError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Channel not found: {0}")]
    NotFound(i32),
    #[error("Sender error: {0}")]
    SenderError(#[from] SenderError),
}

/// Owns channel storage and alert fan-out. One instance is shared between the
/// rule engine and the admin routes.
pub struct NotificationService {
    pool: PgPool,
    encryption: Arc<EncryptionService>,
    client: Client,
}

async fn send_via_config(
    client: Client,
    config: &ChannelConfig,
    context: &AlertContext,
) -> Result<Option<String>, SenderError> {
    match config {
        ChannelConfig::Telegram { .. } => TelegramSender::new(client).send(config, context).await,
        ChannelConfig::Slack { .. } => SlackSender::new(client).send(config, context).await,
        ChannelConfig::Webhook { .. } => WebhookSender::new(client).send(config, context).await,
    }
}

impl NotificationService {
    pub fn new(pool: PgPool, encryption: Arc<EncryptionService>, client: Client) -> Self {
        Self {
            pool,
            encryption,
            client,
        }
    }

    /// Fans a triggered alert out to every selected channel.
    ///
    /// Channels fire concurrently and independently: one channel failing is
    /// captured in its own result and never affects the others, and nothing
    /// here escalates to the caller as a hard error. Every attempt lands in
    /// the notification log.
    pub async fn dispatch_for_alert(
        &self,
        alert: &Alert,
        threshold: &AlertThreshold,
    ) -> Vec<NotificationResult> {
        let context = AlertContext::from_alert(alert, threshold);
        let ctx = &context;
        let mut tasks: Vec<BoxFuture<'_, NotificationResult>> = Vec::new();

        if threshold.notify_email {
            let pool = self.pool.clone();
            tasks.push(Box::pin(async move {
                match notification_log_service::create_owner_notification(
                    &pool,
                    &ctx.title,
                    &ctx.message,
                )
                .await
                {
                    Ok(_) => NotificationResult::ok(NotificationProvider::Owner, None),
                    Err(e) => NotificationResult::failed(NotificationProvider::Owner, e.to_string()),
                }
            }));
        }

        let channels = match self.enabled_channel_configs().await {
            Ok(channels) => channels,
            Err(e) => {
                error!(error = %e, "Failed to load notification channels; skipping chat fan-out.");
                Vec::new()
            }
        };
        for (channel_name, config) in channels {
            let client = self.client.clone();
            tasks.push(Box::pin(async move {
                let provider = config.provider();
                match send_via_config(client, &config, ctx).await {
                    Ok(message_id) => NotificationResult::ok(provider, message_id),
                    Err(e) => {
                        warn!(channel = %channel_name, error = %e, "Channel delivery failed.");
                        NotificationResult::failed(provider, e.to_string())
                    }
                }
            }));
        }

        if threshold.notify_webhook {
            if let Some(url) = threshold.webhook_url.clone() {
                let client = self.client.clone();
                let config = ChannelConfig::Webhook {
                    url,
                    body_template: None,
                };
                tasks.push(Box::pin(async move {
                    match send_via_config(client, &config, ctx).await {
                        Ok(message_id) => {
                            NotificationResult::ok(NotificationProvider::Webhook, message_id)
                        }
                        Err(e) => {
                            warn!(threshold_id = threshold.id, error = %e, "Threshold webhook delivery failed.");
                            NotificationResult::failed(NotificationProvider::Webhook, e.to_string())
                        }
                    }
                }));
            }
        }

        let results = join_all(tasks).await;

        for result in &results {
            if result.success {
                info!(alert_id = alert.id, provider = %result.provider, "Notification delivered.");
            }
            if let Err(e) =
                notification_log_service::record_attempt(&self.pool, Some(alert.id), result).await
            {
                warn!(alert_id = alert.id, provider = %result.provider, error = %e,
                    "Failed to record notification attempt.");
            }
        }

        results
    }

    /// Decrypts the enabled channel rows into typed configs. A row whose
    /// config no longer decrypts or parses is skipped with a warning so one
    /// bad channel cannot block the rest.
    async fn enabled_channel_configs(
        &self,
    ) -> Result<Vec<(String, ChannelConfig)>, NotificationError> {
        let rows = sqlx::query_as::<_, NotificationChannel>(
            "SELECT * FROM notification_channels WHERE is_enabled = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            match self.decode_config(&row) {
                Ok(config) => configs.push((row.name, config)),
                Err(e) => {
                    warn!(channel_id = row.id, channel = %row.name, error = %e,
                        "Skipping channel with unreadable config.");
                }
            }
        }
        Ok(configs)
    }

    fn decode_config(&self, row: &NotificationChannel) -> Result<ChannelConfig, NotificationError> {
        let decrypted = self.encryption.decrypt(&row.config)?;
        Ok(serde_json::from_slice(&decrypted)?)
    }

    pub async fn create_channel(
        &self,
        payload: CreateChannelRequest,
    ) -> Result<ChannelResponse, NotificationError> {
        let config: ChannelConfig = serde_json::from_value(payload.config)?;
        let encrypted = self.encryption.encrypt(&serde_json::to_vec(&config)?)?;

        let channel = sqlx::query_as::<_, NotificationChannel>(
            r#"
            INSERT INTO notification_channels (name, channel_type, config, is_enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(config.channel_type())
        .bind(&encrypted)
        .bind(payload.is_enabled.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;

        Ok(channel_response(&channel))
    }

    pub async fn get_all_channels(&self) -> Result<Vec<ChannelResponse>, NotificationError> {
        let channels = sqlx::query_as::<_, NotificationChannel>(
            "SELECT * FROM notification_channels ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(channels.iter().map(channel_response).collect())
    }

    pub async fn update_channel(
        &self,
        channel_id: i32,
        payload: UpdateChannelRequest,
    ) -> Result<ChannelResponse, NotificationError> {
        let current = self.get_channel_row(channel_id).await?;

        let name = payload.name.unwrap_or(current.name);
        let is_enabled = payload.is_enabled.unwrap_or(current.is_enabled);
        let (channel_type, config_bytes) = if let Some(new_config) = payload.config {
            let config: ChannelConfig = serde_json::from_value(new_config)?;
            let encrypted = self.encryption.encrypt(&serde_json::to_vec(&config)?)?;
            (config.channel_type().to_string(), encrypted)
        } else {
            (current.channel_type, current.config)
        };

        let channel = sqlx::query_as::<_, NotificationChannel>(
            r#"
            UPDATE notification_channels
            SET name = $2, channel_type = $3, config = $4, is_enabled = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(channel_id)
        .bind(&name)
        .bind(&channel_type)
        .bind(&config_bytes)
        .bind(is_enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(channel_response(&channel))
    }

    pub async fn delete_channel(&self, channel_id: i32) -> Result<(), NotificationError> {
        let result = sqlx::query("DELETE FROM notification_channels WHERE id = $1")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotificationError::NotFound(channel_id));
        }
        Ok(())
    }

    /// Sends a synthetic message through one channel and logs the attempt.
    pub async fn test_channel(&self, channel_id: i32) -> Result<NotificationResult, NotificationError> {
        let row = self.get_channel_row(channel_id).await?;
        let config = self.decode_config(&row)?;
        let context = AlertContext::test_message(&row.name);

        let provider = config.provider();
        let result = match send_via_config(self.client.clone(), &config, &context).await {
            Ok(message_id) => NotificationResult::ok(provider, message_id),
            Err(e) => NotificationResult::failed(provider, e.to_string()),
        };

        if let Err(e) = notification_log_service::record_attempt(&self.pool, None, &result).await {
            warn!(channel_id, error = %e, "Failed to record test notification attempt.");
        }
        Ok(result)
    }

    async fn get_channel_row(&self, channel_id: i32) -> Result<NotificationChannel, NotificationError> {
        sqlx::query_as::<_, NotificationChannel>(
            "SELECT * FROM notification_channels WHERE id = $1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(NotificationError::NotFound(channel_id))
    }
}

fn channel_response(channel: &NotificationChannel) -> ChannelResponse {
    ChannelResponse {
        id: channel.id,
        name: channel.name.clone(),
        channel_type: channel.channel_type.clone(),
        is_enabled: channel.is_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mirrors the fan-out assembly in dispatch_for_alert: each channel is its
    // own future and a failure stays confined to its own result.
    #[tokio::test]
    async fn one_failing_channel_does_not_affect_the_other() {
        let client = Client::new();
        let context = AlertContext::test_message("isolation");
        let ctx = &context;
        // A Slack config handed to the Telegram sender fails locally, before
        // any network traffic.
        let mismatched = ChannelConfig::Slack {
            webhook_url: "https://hooks.invalid/T000/B000".to_string(),
        };

        let tasks: Vec<BoxFuture<'_, NotificationResult>> = vec![
            Box::pin(async move {
                match TelegramSender::new(client).send(&mismatched, ctx).await {
                    Ok(id) => NotificationResult::ok(NotificationProvider::Telegram, id),
                    Err(e) => {
                        NotificationResult::failed(NotificationProvider::Telegram, e.to_string())
                    }
                }
            }),
            Box::pin(async { NotificationResult::ok(NotificationProvider::Owner, None) }),
        ];

        let results = join_all(tasks).await;
        assert!(!results[0].success);
        assert!(results[0].error.is_some());
        assert!(results[1].success);
        assert!(results[1].error.is_none());
    }
}
