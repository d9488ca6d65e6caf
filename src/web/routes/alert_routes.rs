use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use std::sync::Arc;

use crate::db::models::Alert;
use crate::db::services::alert_service;
use crate::web::models::alert_models::{AcknowledgeAlertRequest, ListAlertsQuery};
use crate::web::{AppError, AppState};

pub fn create_alert_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_alerts_handler))
        .route("/{id}", get(get_alert_handler))
        .route("/{id}/acknowledge", put(acknowledge_alert_handler))
        .route("/{id}/resolve", put(resolve_alert_handler))
}

async fn list_alerts_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListAlertsQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let alerts = alert_service::list_alerts(
        &app_state.pool,
        params.status.as_deref(),
        params.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(alerts))
}

async fn get_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Alert>, AppError> {
    let alert = alert_service::get_alert_by_id(&app_state.pool, id).await?;
    Ok(Json(alert))
}

async fn acknowledge_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<AcknowledgeAlertRequest>,
) -> Result<Json<Alert>, AppError> {
    let alert =
        alert_service::acknowledge_alert(&app_state.pool, id, payload.acknowledged_by_id).await?;
    Ok(Json(alert))
}

async fn resolve_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Alert>, AppError> {
    let alert = alert_service::resolve_alert(&app_state.pool, id).await?;
    Ok(Json(alert))
}
