//! Stand-in for hosts without Health Connect

use async_trait::async_trait;

use super::{HealthPlatform, HostPlatform, PlatformError, ReadRecordsResponse, TimeRangeFilter};
use crate::engine::permissions::{PermissionRequirement, RecordType};

/// Every call fails fast with `PlatformError::Unsupported`
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedPlatform {
    host: HostPlatform,
}

impl UnsupportedPlatform {
    pub fn new(host: HostPlatform) -> Self {
        Self { host }
    }

    fn error(&self) -> PlatformError {
        PlatformError::Unsupported(format!(
            "Health Connect is Android-only (running on {})",
            self.host.name()
        ))
    }
}

#[async_trait]
impl HealthPlatform for UnsupportedPlatform {
    async fn initialize(&self) -> Result<bool, PlatformError> {
        Err(self.error())
    }

    async fn get_granted_permissions(&self) -> Result<Vec<PermissionRequirement>, PlatformError> {
        Err(self.error())
    }

    async fn request_permission(
        &self,
        _permissions: &[PermissionRequirement],
    ) -> Result<Vec<PermissionRequirement>, PlatformError> {
        Err(self.error())
    }

    async fn read_records(
        &self,
        _record_type: RecordType,
        _filter: &TimeRangeFilter,
    ) -> Result<ReadRecordsResponse, PlatformError> {
        Err(self.error())
    }

    fn host_supported(&self) -> bool {
        false
    }
}
