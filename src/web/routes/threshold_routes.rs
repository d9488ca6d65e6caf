use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use std::sync::Arc;

use crate::db::models::AlertThreshold;
use crate::db::services::threshold_service;
use crate::web::models::threshold_models::{
    CreateThresholdRequest, UpdateThresholdRequest, UpdateThresholdStatusRequest,
};
use crate::web::{AppError, AppState};

pub fn create_threshold_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(get_all_thresholds_handler).post(create_threshold_handler),
        )
        .route(
            "/{id}",
            get(get_threshold_handler)
                .put(update_threshold_handler)
                .delete(delete_threshold_handler),
        )
        .route("/{id}/status", put(update_threshold_status_handler))
}

async fn create_threshold_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateThresholdRequest>,
) -> Result<Json<AlertThreshold>, AppError> {
    let threshold = threshold_service::create_threshold(&app_state.pool, payload).await?;
    Ok(Json(threshold))
}

async fn get_all_thresholds_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<AlertThreshold>>, AppError> {
    let thresholds = threshold_service::get_all_thresholds(&app_state.pool).await?;
    Ok(Json(thresholds))
}

async fn get_threshold_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<AlertThreshold>, AppError> {
    let threshold = threshold_service::get_threshold_by_id(&app_state.pool, id).await?;
    Ok(Json(threshold))
}

async fn update_threshold_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateThresholdRequest>,
) -> Result<Json<AlertThreshold>, AppError> {
    let threshold = threshold_service::update_threshold(&app_state.pool, id, payload).await?;
    Ok(Json(threshold))
}

async fn delete_threshold_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<(), AppError> {
    threshold_service::delete_threshold(&app_state.pool, id).await
}

async fn update_threshold_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateThresholdStatusRequest>,
) -> Result<Json<AlertThreshold>, AppError> {
    let threshold =
        threshold_service::set_threshold_enabled(&app_state.pool, id, payload.is_enabled).await?;
    Ok(Json(threshold))
}
