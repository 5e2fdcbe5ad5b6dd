//! Typed health records
//!
//! The platform hands back loosely shaped JSON. Each record type gets a struct
//! with explicit optional fields, and a batch is validated as a whole before any
//! reduction runs.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{DashboardError, Result};
use super::permissions::RecordType;
use super::platform::ReadRecordsResponse;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsRecord {
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Energy {
    #[serde(default)]
    pub in_kilocalories: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaloriesRecord {
    #[serde(default)]
    pub energy: Option<Energy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateRecord {
    #[serde(default)]
    pub beats_per_minute: Option<u32>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepDuration {
    #[serde(default)]
    pub in_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSessionRecord {
    #[serde(default)]
    pub duration: Option<SleepDuration>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Checks serde cannot express
trait Validate {
    fn validate(&self) -> std::result::Result<(), String>;
}

fn non_negative(field: &str, value: Option<f64>) -> std::result::Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(format!("{} must be a non-negative number, got {}", field, v)),
        _ => Ok(()),
    }
}

impl Validate for StepsRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Validate for CaloriesRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        non_negative(
            "energy.inKilocalories",
            self.energy.as_ref().and_then(|e| e.in_kilocalories),
        )
    }
}

impl Validate for HeartRateRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Validate for SleepSessionRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        non_negative(
            "duration.inMinutes",
            self.duration.as_ref().and_then(|d| d.in_minutes),
        )
    }
}

/// One validated query result
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    Steps(Vec<StepsRecord>),
    Calories(Vec<CaloriesRecord>),
    HeartRate(Vec<HeartRateRecord>),
    Sleep(Vec<SleepSessionRecord>),
}

impl RecordBatch {
    /// Validate a raw response; an absent list is an empty batch
    pub fn parse(record_type: RecordType, response: ReadRecordsResponse) -> Result<Self> {
        let raw = response.records.unwrap_or_default();
        Ok(match record_type {
            RecordType::Steps => RecordBatch::Steps(parse_all(record_type, raw)?),
            RecordType::ActiveCaloriesBurned => RecordBatch::Calories(parse_all(record_type, raw)?),
            RecordType::HeartRate => RecordBatch::HeartRate(parse_all(record_type, raw)?),
            RecordType::SleepSession => RecordBatch::Sleep(parse_all(record_type, raw)?),
        })
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBatch::Steps(_) => RecordType::Steps,
            RecordBatch::Calories(_) => RecordType::ActiveCaloriesBurned,
            RecordBatch::HeartRate(_) => RecordType::HeartRate,
            RecordBatch::Sleep(_) => RecordType::SleepSession,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Steps(r) => r.len(),
            RecordBatch::Calories(r) => r.len(),
            RecordBatch::HeartRate(r) => r.len(),
            RecordBatch::Sleep(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_all<T>(record_type: RecordType, raw: Vec<serde_json::Value>) -> Result<Vec<T>>
where
    T: DeserializeOwned + Validate,
{
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            let record: T = serde_json::from_value(value).map_err(|e| malformed(record_type, index, e))?;
            record.validate().map_err(|e| malformed(record_type, index, e))?;
            Ok(record)
        })
        .collect()
}

fn malformed(record_type: RecordType, index: usize, reason: impl std::fmt::Display) -> DashboardError {
    DashboardError::Fetch(format!("Malformed {} record #{}: {}", record_type, index, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(records: Vec<serde_json::Value>) -> ReadRecordsResponse {
        ReadRecordsResponse {
            records: Some(records),
        }
    }

    #[test]
    fn test_absent_list_is_empty_batch() {
        let batch = RecordBatch::parse(RecordType::Steps, ReadRecordsResponse::default()).unwrap();
        assert_eq!(batch, RecordBatch::Steps(vec![]));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_optional_fields_may_be_missing() {
        let batch = RecordBatch::parse(
            RecordType::ActiveCaloriesBurned,
            response(vec![json!({}), json!({ "energy": {} }), json!({ "energy": { "inKilocalories": 80.1 } })]),
        )
        .unwrap();
        let RecordBatch::Calories(records) = batch else {
            panic!("expected calories batch");
        };
        assert_eq!(records[0].energy, None);
        assert_eq!(records[1].energy, Some(Energy::default()));
        assert_eq!(records[2].energy.as_ref().unwrap().in_kilocalories, Some(80.1));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let batch = RecordBatch::parse(
            RecordType::HeartRate,
            response(vec![json!({
                "beatsPerMinute": 72,
                "startTime": "2024-03-01T08:00:00Z",
                "metadata": { "id": "abc" }
            })]),
        )
        .unwrap();
        assert_eq!(batch.record_type(), RecordType::HeartRate);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_wrong_field_type_is_a_fetch_error() {
        let err = RecordBatch::parse(
            RecordType::Steps,
            response(vec![json!({ "count": 5 }), json!({ "count": "many" })]),
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::Fetch(_)));
        assert!(err.to_string().contains("Malformed Steps record #1"));
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let err = RecordBatch::parse(
            RecordType::SleepSession,
            response(vec![json!({ "duration": { "inMinutes": -5.0 } })]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duration.inMinutes"));

        assert!(RecordBatch::parse(
            RecordType::ActiveCaloriesBurned,
            response(vec![json!({ "energy": { "inKilocalories": -1.0 } })]),
        )
        .is_err());
    }
}
