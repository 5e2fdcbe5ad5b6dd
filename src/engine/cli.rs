//! VitalDash CLI Module
//! Command-line interface for running the dashboard off device

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::config::{ConfigError, DashboardConfig};

#[derive(Parser, Debug)]
#[command(name = "vitaldash")]
#[command(author = "VitalDash Team")]
#[command(version)]
#[command(about = "Daily health metrics from the platform health service", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Health store fixture to read instead of the platform service
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request access if needed and show the last window's metrics
    Fetch,

    /// Show granted and missing permissions
    Permissions,

    /// Clear access locally and show how to finish revoking
    Revoke,
}

impl Cli {
    /// Config file, then `--fixture` on top
    pub fn resolve_config(&self) -> Result<DashboardConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::load_file(path)?,
            None => DashboardConfig::load_user()?,
        };
        if let Some(fixture) = &self.fixture {
            config.fixture = Some(fixture.clone());
        }
        Ok(config)
    }
}
