pub mod alert_models;
pub mod threshold_models;
