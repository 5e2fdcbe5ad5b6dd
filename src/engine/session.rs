//! Permission / Session Manager
//!
//! Tracks whether the platform service is ready and which read grants it
//! currently reports.

use serde::Serialize;

use super::error::{DashboardError, Result};
use super::permissions::{self, GrantedPermissionSet, REQUIRED_PERMISSIONS};
use super::platform::{HealthPlatform, PlatformError};

pub const REVOKE_NOTICE_TITLE: &str = "Access Revoked";
pub const REVOKE_NOTICE_MESSAGE: &str = "Permissions cleared locally. To fully revoke, open the Health Connect app, go to \"Apps using your data\", and remove access for this app.";

/// Result of a permission prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGrant {
    pub granted: GrantedPermissionSet,
    pub satisfied: bool,
}

/// Shown after a local revoke; the platform offers no revoke call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokeNotice {
    pub title: &'static str,
    pub message: &'static str,
}

impl Default for RevokeNotice {
    fn default() -> Self {
        Self {
            title: REVOKE_NOTICE_TITLE,
            message: REVOKE_NOTICE_MESSAGE,
        }
    }
}

pub struct SessionManager<P> {
    platform: P,
    initialized: bool,
    granted: GrantedPermissionSet,
}

impl<P: HealthPlatform> SessionManager<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            initialized: false,
            granted: GrantedPermissionSet::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn granted(&self) -> &GrantedPermissionSet {
        &self.granted
    }

    /// Set up the platform service and load its current grants
    pub async fn initialize(&mut self) -> Result<()> {
        let ready = self.platform.initialize().await.map_err(init_error)?;
        if !ready {
            tracing::warn!("Health Connect declined initialization");
            return Err(DashboardError::Initialization(
                "service reported failure".to_string(),
            ));
        }
        self.initialized = true;
        tracing::info!("Health Connect initialized");

        self.refresh_granted().await.map_err(|e| match e {
            DashboardError::Fetch(message) => DashboardError::Initialization(message),
            other => other,
        })
    }

    /// Re-query the platform's current grants
    pub async fn refresh_granted(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(DashboardError::NotInitialized);
        }
        let granted = self
            .platform
            .get_granted_permissions()
            .await
            .map_err(platform_error)?;
        self.granted.replace(GrantedPermissionSet::from(granted));
        tracing::debug!(granted = self.granted.len(), "Loaded granted permissions");
        Ok(())
    }

    pub fn has_all_required(&self, granted: &GrantedPermissionSet) -> bool {
        permissions::has_all_required(granted)
    }

    /// Whether the cached grants are sufficient
    pub fn has_permissions(&self) -> bool {
        permissions::has_all_required(&self.granted)
    }

    /// Prompt for the required grants; the answer replaces the cached set
    pub async fn request_permissions(&mut self) -> Result<PermissionGrant> {
        if !self.initialized {
            return Err(DashboardError::NotInitialized);
        }
        let granted = self
            .platform
            .request_permission(&REQUIRED_PERMISSIONS)
            .await
            .map_err(platform_error)?;
        let granted = GrantedPermissionSet::from(granted);
        self.granted.replace(granted.clone());

        let satisfied = permissions::has_all_required(&granted);
        if satisfied {
            tracing::info!("All required permissions granted");
        } else {
            tracing::warn!(missing = ?granted.missing(), "Some permissions denied");
        }
        Ok(PermissionGrant { granted, satisfied })
    }

    /// Forget grants locally; the user finishes revocation in Health Connect
    pub fn revoke(&mut self) -> RevokeNotice {
        self.granted.clear();
        tracing::info!("Permissions cleared locally");
        RevokeNotice::default()
    }
}

fn init_error(err: PlatformError) -> DashboardError {
    match err {
        PlatformError::Unsupported(message) => DashboardError::PlatformUnsupported(message),
        PlatformError::Failure(message) => DashboardError::Initialization(message),
    }
}

fn platform_error(err: PlatformError) -> DashboardError {
    match err {
        PlatformError::Unsupported(message) => DashboardError::PlatformUnsupported(message),
        PlatformError::Failure(message) => DashboardError::Fetch(message),
    }
}
