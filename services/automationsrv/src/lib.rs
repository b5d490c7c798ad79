//! Automation service
//!
//! Wires the facility rule engine to a fixture-backed data store, the
//! tracing notification sink and the tick scheduler.

pub mod app;
pub mod config;

pub use config::AutomationConfig;
