pub mod alert_routes;
pub mod channel_routes;
pub mod metrics_routes;
pub mod threshold_routes;
