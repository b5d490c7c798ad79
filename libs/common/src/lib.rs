//! Common service library
//!
//! Plumbing shared by the automation service binaries:
//! - logging initialisation (console + daily file)
//! - layered configuration loading (defaults, YAML file, environment)
//! - graceful shutdown signal

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};
