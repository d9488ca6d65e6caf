//! The `services` module provides a high-level API for interacting with the database.
//! It encapsulates all the SQL logic and data access patterns, allowing the rest of
//! the application (HTTP handlers, the collection scheduler, the rule engine) to work
//! with domain models without needing to know about the underlying schema or queries.

pub mod alert_service;
pub mod history_service;
pub mod notification_log_service;
pub mod threshold_service;
