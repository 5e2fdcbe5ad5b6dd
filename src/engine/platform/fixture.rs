//! Fixture-backed health store
//!
//! Serves records and grants from a JSON document so the dashboard can run off
//! device and under test. Applies the same inclusive `between` filter as the
//! real service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};

use super::{HealthPlatform, PlatformError, ReadRecordsResponse, TimeRangeFilter};
use crate::engine::permissions::{PermissionRequirement, RecordType};

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to read fixture: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid fixture format: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Failure key for `initialize`
pub const FAIL_INITIALIZE: &str = "initialize";
/// Failure key for `requestPermission`
pub const FAIL_REQUEST_PERMISSION: &str = "requestPermission";

/// On-disk shape of a fixture file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthFixture {
    /// What `initialize` answers
    #[serde(default = "default_available")]
    pub available: bool,
    /// Grants present before any prompt
    #[serde(default)]
    pub granted: Vec<PermissionRequirement>,
    /// Grants the user accepts when prompted; `None` accepts everything
    #[serde(default)]
    pub grant_on_request: Option<Vec<PermissionRequirement>>,
    /// Call name or record type mapped to the message it throws
    #[serde(default)]
    pub failures: HashMap<String, String>,
    #[serde(default)]
    pub records: HashMap<RecordType, Vec<serde_json::Value>>,
}

fn default_available() -> bool {
    true
}

impl Default for HealthFixture {
    fn default() -> Self {
        Self {
            available: true,
            granted: Vec::new(),
            grant_on_request: None,
            failures: HashMap::new(),
            records: HashMap::new(),
        }
    }
}

impl HealthFixture {
    pub fn with_records(mut self, record_type: RecordType, records: Vec<serde_json::Value>) -> Self {
        self.records.insert(record_type, records);
        self
    }

    pub fn with_failure(mut self, key: &str, message: &str) -> Self {
        self.failures.insert(key.to_string(), message.to_string());
        self
    }
}

/// Holds `read_records` calls until released, so a caller can act mid-fetch
#[derive(Debug)]
pub struct ReadGate {
    entered: Notify,
    held: Semaphore,
}

impl ReadGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            held: Semaphore::new(0),
        })
    }

    /// Resolves once a read has reached the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let every pending and future read through
    pub fn release(&self) {
        self.held.close();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        // Closed semaphore means released
        let _ = self.held.acquire().await;
    }
}

pub struct FixturePlatform {
    fixture: Mutex<HealthFixture>,
    read_calls: AtomicUsize,
    permission_prompts: AtomicUsize,
    read_gate: Option<Arc<ReadGate>>,
}

impl FixturePlatform {
    pub fn new(fixture: HealthFixture) -> Self {
        Self {
            fixture: Mutex::new(fixture),
            read_calls: AtomicUsize::new(0),
            permission_prompts: AtomicUsize::new(0),
            read_gate: None,
        }
    }

    pub fn with_read_gate(mut self, gate: Arc<ReadGate>) -> Self {
        self.read_gate = Some(gate);
        self
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, FixtureError> {
        let fixture: HealthFixture = serde_json::from_str(content)?;
        Ok(Self::new(fixture))
    }

    /// Number of `read_records` calls served so far
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of permission prompts shown so far
    pub fn permission_prompts(&self) -> usize {
        self.permission_prompts.load(Ordering::SeqCst)
    }

    /// Edit the backing fixture between calls
    pub fn update<F: FnOnce(&mut HealthFixture)>(&self, f: F) {
        f(&mut self.lock());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthFixture> {
        self.fixture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure(&self, key: &str) -> Option<PlatformError> {
        self.lock()
            .failures
            .get(key)
            .map(|message| PlatformError::Failure(message.clone()))
    }
}

#[async_trait]
impl HealthPlatform for FixturePlatform {
    async fn initialize(&self) -> Result<bool, PlatformError> {
        if let Some(err) = self.failure(FAIL_INITIALIZE) {
            return Err(err);
        }
        Ok(self.lock().available)
    }

    async fn get_granted_permissions(&self) -> Result<Vec<PermissionRequirement>, PlatformError> {
        Ok(self.lock().granted.clone())
    }

    async fn request_permission(
        &self,
        permissions: &[PermissionRequirement],
    ) -> Result<Vec<PermissionRequirement>, PlatformError> {
        self.permission_prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure(FAIL_REQUEST_PERMISSION) {
            return Err(err);
        }

        let mut fixture = self.lock();
        let mut granted = fixture.granted.clone();
        for permission in permissions {
            let accepted = fixture
                .grant_on_request
                .as_ref()
                .map_or(true, |allowed| allowed.contains(permission));
            if accepted && !granted.contains(permission) {
                granted.push(*permission);
            }
        }
        fixture.granted = granted.clone();
        Ok(granted)
    }

    async fn read_records(
        &self,
        record_type: RecordType,
        filter: &TimeRangeFilter,
    ) -> Result<ReadRecordsResponse, PlatformError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.read_gate {
            gate.pass().await;
        }
        if let Some(err) = self.failure(record_type.as_str()) {
            return Err(err);
        }

        let fixture = self.lock();
        let records = fixture.records.get(&record_type).map(|records| {
            records
                .iter()
                .filter(|record| in_window(record, filter))
                .cloned()
                .collect()
        });
        Ok(ReadRecordsResponse { records })
    }
}

fn timestamp(record: &serde_json::Value, field: &str) -> Option<DateTime<Utc>> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Untimed records always match
fn in_window(record: &serde_json::Value, filter: &TimeRangeFilter) -> bool {
    let start = timestamp(record, "startTime");
    let end = timestamp(record, "endTime").or(start);
    let starts_inside = start.map_or(true, |s| s >= filter.start_time);
    let ends_inside = end.map_or(true, |e| e <= filter.end_time);
    starts_inside && ends_inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::permissions::REQUIRED_PERMISSIONS;
    use chrono::TimeZone;
    use serde_json::json;

    fn window() -> TimeRangeFilter {
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        TimeRangeFilter::trailing_hours(end, 24).unwrap()
    }

    #[tokio::test]
    async fn test_records_outside_window_are_filtered() {
        let fixture = HealthFixture::default().with_records(
            RecordType::Steps,
            vec![
                json!({ "count": 10, "startTime": "2024-03-01T13:00:00Z", "endTime": "2024-03-01T14:00:00Z" }),
                json!({ "count": 20, "startTime": "2024-02-28T13:00:00Z", "endTime": "2024-02-28T14:00:00Z" }),
                json!({ "count": 30 }),
            ],
        );
        let platform = FixturePlatform::new(fixture);

        let response = platform.read_records(RecordType::Steps, &window()).await.unwrap();
        let counts: Vec<_> = response
            .records
            .unwrap()
            .iter()
            .map(|r| r["count"].as_u64().unwrap())
            .collect();
        assert_eq!(counts, vec![10, 30]);
        assert_eq!(platform.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_type_yields_absent_list() {
        let platform = FixturePlatform::new(HealthFixture::default());
        let response = platform.read_records(RecordType::SleepSession, &window()).await.unwrap();
        assert!(response.records.is_none());
    }

    #[tokio::test]
    async fn test_request_grants_only_accepted_subset() {
        let fixture = HealthFixture {
            grant_on_request: Some(vec![REQUIRED_PERMISSIONS[0]]),
            ..Default::default()
        };
        let platform = FixturePlatform::new(fixture);

        let granted = platform.request_permission(&REQUIRED_PERMISSIONS).await.unwrap();
        assert_eq!(granted, vec![REQUIRED_PERMISSIONS[0]]);
        assert_eq!(platform.get_granted_permissions().await.unwrap(), granted);
        assert_eq!(platform.permission_prompts(), 1);
    }

    #[tokio::test]
    async fn test_configured_failures_are_thrown() {
        let platform = FixturePlatform::new(
            HealthFixture::default().with_failure("HeartRate", "service disconnected"),
        );
        let err = platform.read_records(RecordType::HeartRate, &window()).await.unwrap_err();
        assert_eq!(err, PlatformError::Failure("service disconnected".into()));
    }

    #[test]
    fn test_fixture_json_shape() {
        let platform = FixturePlatform::from_json(
            r#"{
                "available": false,
                "granted": [{ "accessType": "read", "recordType": "Steps" }],
                "records": { "ActiveCaloriesBurned": [{ "energy": { "inKilocalories": 12.5 } }] }
            }"#,
        )
        .unwrap();
        let fixture = platform.lock();
        assert!(!fixture.available);
        assert_eq!(fixture.granted.len(), 1);
        assert_eq!(fixture.records[&RecordType::ActiveCaloriesBurned].len(), 1);
    }

    #[tokio::test]
    async fn test_gated_read_waits_for_release() {
        let gate = ReadGate::new();
        let platform = FixturePlatform::new(HealthFixture::default().with_records(
            RecordType::Steps,
            vec![json!({ "count": 3 })],
        ))
        .with_read_gate(Arc::clone(&gate));

        let filter = window();
        let (response, _) = tokio::join!(platform.read_records(RecordType::Steps, &filter), async {
            gate.entered().await;
            assert_eq!(platform.read_calls(), 1);
            gate.release();
        });
        assert_eq!(response.unwrap().records.unwrap().len(), 1);
    }
}
