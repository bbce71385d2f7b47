//! Service configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! `LEDGER_`-prefixed environment variables (nested keys separated by `__`,
//! e.g. `LEDGER_GATEWAY__PORT=9000`), and finally command-line flags.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use ledger::LedgerConfig;
use ledger_gateway::GatewayConfig;
use persistence::PersistenceConfig;

/// Prefix of environment variables read by [`load_config`]
pub const ENV_PREFIX: &str = "LEDGER";

/// Command-line arguments
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ledger-broadcaster", version, about = "Real-time shared ledger broadcaster")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for ledger snapshots
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service-level configuration
    pub service: ServiceSettings,

    /// LedgerGateway configuration
    pub gateway: GatewayConfig,

    /// Event processor configuration
    pub ledger: LedgerConfig,

    /// Persistence configuration
    pub persistence: PersistenceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Log file path (if None, logs to stdout)
    pub file: Option<PathBuf>,

    /// Colored output (ignored for files and json)
    pub ansi: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { shutdown_timeout_secs: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string(), file: None, ansi: true }
    }
}

impl ServiceConfig {
    /// Apply command-line overrides
    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(host) = &cli.host {
            self.gateway.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.gateway.port = port;
        }
        if let Some(data_dir) = &cli.data_dir {
            self.persistence.data_dir = data_dir.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            self.logging.format = format.clone();
        }
    }
}

/// Load configuration from all sources and validate it
pub fn load_config(cli: &CliArgs) -> Result<ServiceConfig> {
    let mut config = build_config(cli.config.as_deref(), ENV_PREFIX)?;
    config.apply_cli(cli);

    validate_config(&config)?;

    Ok(config)
}

/// Merge defaults, an optional TOML file and environment variables
pub fn build_config(file: Option<&Path>, env_prefix: &str) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(
            config::File::from(path).format(config::FileFormat::Toml).required(true),
        );
    }

    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    if config.service.shutdown_timeout_secs == 0 {
        return Err(anyhow::anyhow!("shutdown_timeout_secs must be greater than 0"));
    }

    config.gateway.validate().map_err(|e| anyhow::anyhow!("Invalid gateway config: {e}"))?;
    config.ledger.validate().map_err(|e| anyhow::anyhow!("Invalid ledger config: {e}"))?;
    config
        .persistence
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid persistence config: {e}"))?;

    Ok(())
}

/// Render configuration as TOML
pub fn to_toml(config: &ServiceConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}

/// Save configuration to a file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    std::fs::write(path, to_toml(config)?)
        .with_context(|| format!("Failed to write configuration to {path:?}"))
}
