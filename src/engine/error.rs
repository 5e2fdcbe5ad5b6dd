//! Dashboard Error Types

use thiserror::Error;

use super::config::ConfigError;
use super::permissions::PermissionRequirement;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Failed to initialize Health Connect: {0}")]
    Initialization(String),

    #[error("Health Connect not initialized")]
    NotInitialized,

    #[error("Missing required permissions: {}", format_missing(.missing))]
    Permission { missing: Vec<PermissionRequirement> },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("{0}")]
    PlatformUnsupported(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DashboardError {
    /// Errors the user can clear by pressing the action again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DashboardError::Permission { .. } | DashboardError::Fetch(_) | DashboardError::NotInitialized
        )
    }

    /// Errors that end the session until the platform is set up again
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DashboardError::Initialization(_) | DashboardError::PlatformUnsupported(_)
        )
    }
}

fn format_missing(missing: &[PermissionRequirement]) -> String {
    missing
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, DashboardError>;
