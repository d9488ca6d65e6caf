use axum::{
    Router,
    http::Method,
    routing::get,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::collector::scheduler::CollectionScheduler;
use crate::notifications::service::NotificationService;
use crate::web::routes::{alert_routes, channel_routes, metrics_routes, threshold_routes};

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub notification_service: Arc<NotificationService>,
    pub scheduler: Arc<CollectionScheduler>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    pool: PgPool,
    notification_service: Arc<NotificationService>,
    scheduler: Arc<CollectionScheduler>,
) -> Router {
    let app_state = Arc::new(AppState {
        pool,
        notification_service,
        scheduler,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/healthz", get(health_check_handler))
        .route(
            "/api/notifications/log",
            get(channel_routes::notification_log_handler),
        )
        .merge(metrics_routes::metrics_router())
        .nest("/api/thresholds", threshold_routes::create_threshold_router())
        .nest("/api/alerts", alert_routes::create_alert_router())
        .nest("/api/channels", channel_routes::create_channel_router())
        .with_state(app_state)
        .layer(cors)
}
