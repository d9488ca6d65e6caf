use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::models::NotificationLogEntry;
use crate::db::services::notification_log_service;
use crate::notifications::models::{
    ChannelResponse, CreateChannelRequest, NotificationResult, UpdateChannelRequest,
};
use crate::web::{AppError, AppState};

pub fn create_channel_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_all_channels_handler).post(create_channel_handler))
        .route("/{id}", put(update_channel_handler).delete(delete_channel_handler))
        .route("/{id}/test", post(test_channel_handler))
}

async fn create_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel = app_state.notification_service.create_channel(payload).await?;
    Ok(Json(channel))
}

async fn get_all_channels_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    let channels = app_state.notification_service.get_all_channels().await?;
    Ok(Json(channels))
}

async fn update_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateChannelRequest>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel = app_state
        .notification_service
        .update_channel(id, payload)
        .await?;
    Ok(Json(channel))
}

async fn delete_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<(), AppError> {
    app_state.notification_service.delete_channel(id).await?;
    Ok(())
}

async fn test_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<NotificationResult>, AppError> {
    let result = app_state.notification_service.test_channel(id).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogQuery {
    pub alert_id: Option<i32>,
    pub limit: Option<i64>,
}

pub async fn notification_log_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<NotificationLogQuery>,
) -> Result<Json<Vec<NotificationLogEntry>>, AppError> {
    let entries = notification_log_service::list_attempts(
        &app_state.pool,
        params.alert_id,
        params.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(entries))
}
