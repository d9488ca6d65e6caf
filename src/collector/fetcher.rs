use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::ServerConfig;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Metrics endpoint returned status {0}")]
    BadStatus(StatusCode),
}

/// Fetches the raw exposition text from the configured proxy endpoint.
///
/// The shared client carries the bounded request timeout, so a hung endpoint
/// surfaces as a `Network` error rather than wedging the scheduler.
pub async fn fetch_metrics(client: &Client, config: &ServerConfig) -> Result<String, CollectorError> {
    let mut request = client.get(&config.metrics_url);
    if let Some(username) = &config.metrics_username {
        request = request.basic_auth(username, config.metrics_password.as_deref());
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CollectorError::BadStatus(status));
    }
    Ok(response.text().await?)
}
