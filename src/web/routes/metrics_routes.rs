use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::enums::TrendPeriod;
use crate::db::models::ServiceAggregateRow;
use crate::db::services::history_service::{self, TrendSeries};
use crate::web::{AppError, AppState};

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/history", get(history_handler))
        .route("/api/trend", get(trend_handler))
        .route("/api/collect", post(collect_handler))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub service: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<ServiceAggregateRow>>, AppError> {
    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start >= end {
            return Err(AppError::InvalidInput(
                "start must be before end".to_string(),
            ));
        }
    }
    let rows = history_service::query(
        &app_state.pool,
        params.service.as_deref(),
        params.start,
        params.end,
        params.limit.unwrap_or(500),
    )
    .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub service: Option<String>,
    pub period: Option<String>,
}

async fn trend_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<TrendQuery>,
) -> Result<Json<TrendSeries>, AppError> {
    let period = match params.period.as_deref() {
        None => TrendPeriod::Hour,
        Some(raw) => raw
            .parse::<TrendPeriod>()
            .map_err(|_| AppError::InvalidInput(format!("Unknown trend period: {raw}")))?,
    };
    let series = history_service::trend(&app_state.pool, params.service.as_deref(), period).await?;
    Ok(Json(series))
}

/// Operator-triggered collection. 202 when a cycle was started, 409 when one
/// is already in flight.
async fn collect_handler(State(app_state): State<Arc<AppState>>) -> StatusCode {
    if app_state.scheduler.trigger() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    }
}
