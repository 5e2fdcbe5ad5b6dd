//! Platform Health Service Module
//!
//! Host detection and the seam to the operating system's health record store.
//! The store itself is provided by the environment; the dashboard only talks to
//! it through [`HealthPlatform`].

pub mod fixture;
pub mod unsupported;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::config::DashboardConfig;
use super::permissions::{PermissionRequirement, RecordType};

pub use fixture::{FixturePlatform, HealthFixture, ReadGate};
pub use unsupported::UnsupportedPlatform;

/// Operating systems the dashboard may run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Android,
    Ios,
    MacOS,
    Linux,
    Windows,
    Unknown,
}

impl HostPlatform {
    /// Detect current platform
    pub fn current() -> Self {
        #[cfg(target_os = "android")]
        return HostPlatform::Android;

        #[cfg(target_os = "ios")]
        return HostPlatform::Ios;

        #[cfg(target_os = "macos")]
        return HostPlatform::MacOS;

        #[cfg(target_os = "linux")]
        return HostPlatform::Linux;

        #[cfg(target_os = "windows")]
        return HostPlatform::Windows;

        #[cfg(not(any(
            target_os = "android",
            target_os = "ios",
            target_os = "macos",
            target_os = "linux",
            target_os = "windows"
        )))]
        return HostPlatform::Unknown;
    }

    /// Health Connect ships only with Android
    pub fn hosts_health_connect(&self) -> bool {
        matches!(self, HostPlatform::Android)
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostPlatform::Android => "Android",
            HostPlatform::Ios => "iOS",
            HostPlatform::MacOS => "macOS",
            HostPlatform::Linux => "Linux",
            HostPlatform::Windows => "Windows",
            HostPlatform::Unknown => "unknown",
        }
    }
}

/// Failures reported by the platform service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Failure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Between,
}

/// Inclusive time window passed to record queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeFilter {
    pub operator: FilterOperator,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeRangeFilter {
    pub fn between(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            operator: FilterOperator::Between,
            start_time,
            end_time,
        }
    }

    /// Window of `hours` ending at `end`; `None` if the start falls outside chrono's range
    pub fn trailing_hours(end: DateTime<Utc>, hours: u32) -> Option<Self> {
        let span = chrono::Duration::try_hours(i64::from(hours))?;
        let start = end.checked_sub_signed(span)?;
        Some(Self::between(start, end))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_time && instant <= self.end_time
    }
}

/// Raw query result; record shapes are validated later by `records`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRecordsResponse {
    #[serde(default)]
    pub records: Option<Vec<serde_json::Value>>,
}

/// Operations the platform health service exposes
#[async_trait]
pub trait HealthPlatform: Send + Sync {
    /// One-time setup; `Ok(false)` means the service declined
    async fn initialize(&self) -> Result<bool, PlatformError>;

    async fn get_granted_permissions(&self) -> Result<Vec<PermissionRequirement>, PlatformError>;

    /// Prompts the user; returns the subset actually granted
    async fn request_permission(
        &self,
        permissions: &[PermissionRequirement],
    ) -> Result<Vec<PermissionRequirement>, PlatformError>;

    async fn read_records(
        &self,
        record_type: RecordType,
        filter: &TimeRangeFilter,
    ) -> Result<ReadRecordsResponse, PlatformError>;

    /// Whether this host can reach the service at all
    fn host_supported(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: HealthPlatform + ?Sized> HealthPlatform for Box<T> {
    async fn initialize(&self) -> Result<bool, PlatformError> {
        (**self).initialize().await
    }

    async fn get_granted_permissions(&self) -> Result<Vec<PermissionRequirement>, PlatformError> {
        (**self).get_granted_permissions().await
    }

    async fn request_permission(
        &self,
        permissions: &[PermissionRequirement],
    ) -> Result<Vec<PermissionRequirement>, PlatformError> {
        (**self).request_permission(permissions).await
    }

    async fn read_records(
        &self,
        record_type: RecordType,
        filter: &TimeRangeFilter,
    ) -> Result<ReadRecordsResponse, PlatformError> {
        (**self).read_records(record_type, filter).await
    }

    fn host_supported(&self) -> bool {
        (**self).host_supported()
    }
}

#[async_trait]
impl<T: HealthPlatform + ?Sized> HealthPlatform for Arc<T> {
    async fn initialize(&self) -> Result<bool, PlatformError> {
        (**self).initialize().await
    }

    async fn get_granted_permissions(&self) -> Result<Vec<PermissionRequirement>, PlatformError> {
        (**self).get_granted_permissions().await
    }

    async fn request_permission(
        &self,
        permissions: &[PermissionRequirement],
    ) -> Result<Vec<PermissionRequirement>, PlatformError> {
        (**self).request_permission(permissions).await
    }

    async fn read_records(
        &self,
        record_type: RecordType,
        filter: &TimeRangeFilter,
    ) -> Result<ReadRecordsResponse, PlatformError> {
        (**self).read_records(record_type, filter).await
    }

    fn host_supported(&self) -> bool {
        (**self).host_supported()
    }
}

/// Pick the platform backend for this configuration
pub fn connect(config: &DashboardConfig) -> Result<Box<dyn HealthPlatform>, PlatformError> {
    match &config.fixture {
        Some(path) => {
            let platform = FixturePlatform::load(path)
                .map_err(|e| PlatformError::Failure(e.to_string()))?;
            tracing::info!(fixture = %path.display(), "Using fixture health store");
            Ok(Box::new(platform))
        }
        None => {
            let host = HostPlatform::current();
            tracing::warn!(host = host.name(), "No health service binding for this host");
            Ok(Box::new(UnsupportedPlatform::new(host)))
        }
    }
}
