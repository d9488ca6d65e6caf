use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThresholdRequest {
    pub name: String,
    /// None applies the threshold to all services.
    pub service_name: Option<String>,
    pub metric_type: String,
    pub comparison_operator: String,
    pub threshold_value: f64,
    pub window_minutes: Option<i32>,
    pub is_enabled: Option<bool>,
    pub notify_email: Option<bool>,
    pub notify_webhook: Option<bool>,
    pub webhook_url: Option<String>,
    pub cooldown_minutes: Option<i32>,
}

/// Partial update. The nested Options distinguish "field absent, keep the
/// current value" from "field null, clear it".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThresholdRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub service_name: Option<Option<String>>,
    pub metric_type: Option<String>,
    pub comparison_operator: Option<String>,
    pub threshold_value: Option<f64>,
    pub window_minutes: Option<i32>,
    pub notify_email: Option<bool>,
    pub notify_webhook: Option<bool>,
    #[serde(default)]
    pub webhook_url: Option<Option<String>>,
    pub cooldown_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThresholdStatusRequest {
    pub is_enabled: bool,
}
