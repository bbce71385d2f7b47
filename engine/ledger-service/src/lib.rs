//! Ledger Broadcaster Service Library
//!
//! This library provides the core functionality for the ledger broadcaster service,
//! including configuration management, component initialization, and graceful shutdown handling.

use anyhow::{Context, Result};

pub mod config;
pub mod logging;
pub mod service;
pub mod signals;
pub mod store;

pub use config::{CliArgs, ServiceConfig};
pub use logging::initialize_logging;
pub use service::ServiceState;
pub use signals::{graceful_shutdown, setup_signal_handlers};
pub use store::PersistenceStore;

/// Load configuration from files, environment variables and command-line flags
pub fn load_configuration(cli: &CliArgs) -> Result<ServiceConfig> {
    config::load_config(cli).context("Failed to load service configuration")
}
