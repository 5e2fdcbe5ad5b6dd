//! Metrics Aggregator
//!
//! Queries the four record types for a time window and reduces each record set
//! to one scalar. The snapshot is assembled only after all four reads succeed.

use chrono::{DateTime, Utc};
use std::time::Instant;

use super::error::{DashboardError, Result};
use super::permissions::{has_all_required, GrantedPermissionSet, RecordType};
use super::platform::{HealthPlatform, TimeRangeFilter};
use super::records::{
    CaloriesRecord, HeartRateRecord, RecordBatch, SleepSessionRecord, StepsRecord,
};
use super::state::MetricsSnapshot;

pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Result of one successful fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub snapshot: MetricsSnapshot,
    pub window_end: DateTime<Utc>,
}

/// Round to nearest integer, halves away from zero (inputs are non-negative)
pub fn round_half_up(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value + 0.5).floor() as u64
}

pub fn total_steps(records: &[StepsRecord]) -> u64 {
    records.iter().map(|r| r.count.unwrap_or(0)).sum()
}

/// Unrounded kilocalorie total
pub fn total_calories(records: &[CaloriesRecord]) -> f64 {
    records
        .iter()
        .filter_map(|r| r.energy.as_ref().and_then(|e| e.in_kilocalories))
        .sum()
}

/// BPM of the record with the latest start time, 0 for no records.
///
/// On equal start times the first record encountered wins. Records without a
/// start time only win when no record has one.
pub fn latest_heart_rate(records: &[HeartRateRecord]) -> u32 {
    let mut latest: Option<&HeartRateRecord> = None;
    for record in records {
        let newer = match latest {
            None => true,
            Some(current) => match (record.start_time, current.start_time) {
                (Some(candidate), Some(held)) => candidate > held,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if newer {
            latest = Some(record);
        }
    }
    latest.and_then(|r| r.beats_per_minute).unwrap_or(0)
}

/// Minutes one sleep session contributes.
///
/// A positive explicit duration wins; a zero one counts as absent. Otherwise the
/// span between the record's own start and end. Sessions with neither, or ending
/// before they start, count 0.
pub fn sleep_minutes_of(record: &SleepSessionRecord) -> f64 {
    if let Some(minutes) = record
        .duration
        .as_ref()
        .and_then(|d| d.in_minutes)
        .filter(|m| *m > 0.0)
    {
        return minutes;
    }
    match (record.start_time, record.end_time) {
        (Some(start), Some(end)) if end > start => (end - start).num_milliseconds() as f64 / 60_000.0,
        _ => 0.0,
    }
}

/// Unrounded minute total
pub fn total_sleep_minutes(records: &[SleepSessionRecord]) -> f64 {
    records.iter().map(sleep_minutes_of).sum()
}

/// Reduce four validated batches into a snapshot
pub fn reduce(
    steps: &[StepsRecord],
    calories: &[CaloriesRecord],
    heart_rate: &[HeartRateRecord],
    sleep: &[SleepSessionRecord],
) -> MetricsSnapshot {
    MetricsSnapshot {
        steps: total_steps(steps),
        calories: round_half_up(total_calories(calories)),
        heart_rate: latest_heart_rate(heart_rate),
        sleep_minutes: round_half_up(total_sleep_minutes(sleep)),
    }
}

pub struct MetricsAggregator<P> {
    platform: P,
    window_hours: u32,
}

impl<P: HealthPlatform> MetricsAggregator<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }

    pub fn with_window_hours(mut self, hours: u32) -> Self {
        self.window_hours = hours;
        self
    }

    pub fn window_hours(&self) -> u32 {
        self.window_hours
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Fetch the trailing window ending now
    pub async fn fetch_last_24_hours(&self, permissions: &GrantedPermissionSet) -> Result<FetchOutcome> {
        self.fetch_until(permissions, Utc::now()).await
    }

    /// Fetch the trailing window ending at `end`
    pub async fn fetch_until(
        &self,
        permissions: &GrantedPermissionSet,
        end: DateTime<Utc>,
    ) -> Result<FetchOutcome> {
        let window = TimeRangeFilter::trailing_hours(end, self.window_hours).ok_or_else(|| {
            DashboardError::Fetch(format!(
                "Window of {} hours ending {} is out of range",
                self.window_hours, end
            ))
        })?;
        self.fetch_window(permissions, window).await
    }

    pub async fn fetch_window(
        &self,
        permissions: &GrantedPermissionSet,
        window: TimeRangeFilter,
    ) -> Result<FetchOutcome> {
        if !has_all_required(permissions) {
            return Err(DashboardError::Permission {
                missing: permissions.missing(),
            });
        }

        let started = Instant::now();
        let (steps, calories, heart_rate, sleep) = tokio::try_join!(
            self.read(RecordType::Steps, &window),
            self.read(RecordType::ActiveCaloriesBurned, &window),
            self.read(RecordType::HeartRate, &window),
            self.read(RecordType::SleepSession, &window),
        )?;

        let snapshot = match (steps, calories, heart_rate, sleep) {
            (
                RecordBatch::Steps(steps),
                RecordBatch::Calories(calories),
                RecordBatch::HeartRate(heart_rate),
                RecordBatch::Sleep(sleep),
            ) => reduce(&steps, &calories, &heart_rate, &sleep),
            _ => return Err(DashboardError::Fetch("Record batches arrived out of order".into())),
        };

        tracing::info!(
            steps = snapshot.steps,
            calories = snapshot.calories,
            heart_rate = snapshot.heart_rate,
            sleep_minutes = snapshot.sleep_minutes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregated health metrics"
        );

        Ok(FetchOutcome {
            snapshot,
            window_end: window.end_time,
        })
    }

    async fn read(&self, record_type: RecordType, window: &TimeRangeFilter) -> Result<RecordBatch> {
        let response = self
            .platform
            .read_records(record_type, window)
            .await
            .map_err(|e| DashboardError::Fetch(e.to_string()))?;
        let batch = RecordBatch::parse(record_type, response)?;
        tracing::debug!(record_type = %record_type, records = batch.len(), "Read health records");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::permissions::REQUIRED_PERMISSIONS;
    use crate::engine::platform::{FixturePlatform, HealthFixture};
    use crate::engine::records::{Energy, SleepDuration};
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn hr(bpm: u32, start: Option<DateTime<Utc>>) -> HeartRateRecord {
        HeartRateRecord {
            beats_per_minute: Some(bpm),
            start_time: start,
        }
    }

    fn all_granted() -> GrantedPermissionSet {
        REQUIRED_PERMISSIONS.into_iter().collect()
    }

    #[test]
    fn test_empty_lists_reduce_to_zero() {
        assert_eq!(total_steps(&[]), 0);
        assert_eq!(total_calories(&[]), 0.0);
        assert_eq!(total_sleep_minutes(&[]), 0.0);
        assert_eq!(latest_heart_rate(&[]), 0);
        assert!(reduce(&[], &[], &[], &[]).is_empty());
    }

    #[test]
    fn test_steps_sum_treats_missing_as_zero() {
        let records = vec![
            StepsRecord { count: Some(100) },
            StepsRecord { count: Some(250) },
            StepsRecord { count: None },
            StepsRecord { count: Some(50) },
        ];
        assert_eq!(total_steps(&records), 400);
    }

    #[test]
    fn test_calories_round_half_up() {
        let records = vec![
            CaloriesRecord {
                energy: Some(Energy { in_kilocalories: Some(120.4) }),
            },
            CaloriesRecord {
                energy: Some(Energy { in_kilocalories: Some(80.1) }),
            },
            CaloriesRecord { energy: None },
        ];
        assert_eq!(round_half_up(total_calories(&records)), 201);
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
    }

    #[test]
    fn test_latest_heart_rate_by_start_time() {
        let records = vec![hr(60, Some(at(8, 0))), hr(75, Some(at(20, 0))), hr(68, Some(at(12, 0)))];
        assert_eq!(latest_heart_rate(&records), 75);
    }

    #[test]
    fn test_heart_rate_tie_keeps_first_encountered() {
        let records = vec![hr(70, Some(at(9, 0))), hr(90, Some(at(9, 0)))];
        assert_eq!(latest_heart_rate(&records), 70);
    }

    #[test]
    fn test_heart_rate_untimed_records_lose() {
        let records = vec![hr(100, None), hr(64, Some(at(1, 0))), hr(110, None)];
        assert_eq!(latest_heart_rate(&records), 64);
        assert_eq!(latest_heart_rate(&[hr(58, None), hr(59, None)]), 58);
    }

    #[test]
    fn test_heart_rate_missing_bpm_is_zero() {
        let records = vec![HeartRateRecord {
            beats_per_minute: None,
            start_time: Some(at(10, 0)),
        }];
        assert_eq!(latest_heart_rate(&records), 0);
    }

    #[test]
    fn test_sleep_minutes_sources() {
        let explicit = SleepSessionRecord {
            duration: Some(SleepDuration { in_minutes: Some(45.0) }),
            start_time: Some(at(1, 0)),
            end_time: Some(at(5, 0)),
        };
        let spanned = SleepSessionRecord {
            duration: None,
            start_time: Some(at(0, 30)),
            end_time: Some(at(2, 0)),
        };
        let neither = SleepSessionRecord::default();
        let backwards = SleepSessionRecord {
            duration: None,
            start_time: Some(at(6, 0)),
            end_time: Some(at(5, 0)),
        };

        assert_eq!(sleep_minutes_of(&explicit), 45.0);
        assert_eq!(sleep_minutes_of(&spanned), 90.0);
        assert_eq!(sleep_minutes_of(&neither), 0.0);
        assert_eq!(sleep_minutes_of(&backwards), 0.0);
        assert_eq!(total_sleep_minutes(&[explicit, spanned, neither]), 135.0);
    }

    #[test]
    fn test_zero_duration_falls_back_to_span() {
        let zeroed = SleepSessionRecord {
            duration: Some(SleepDuration { in_minutes: Some(0.0) }),
            start_time: Some(at(0, 30)),
            end_time: Some(at(2, 0)),
        };
        assert_eq!(sleep_minutes_of(&zeroed), 90.0);

        let zeroed_untimed = SleepSessionRecord {
            duration: Some(SleepDuration { in_minutes: Some(0.0) }),
            ..Default::default()
        };
        assert_eq!(sleep_minutes_of(&zeroed_untimed), 0.0);
    }

    #[tokio::test]
    async fn test_fetch_requires_permissions_without_calling_platform() {
        let aggregator = MetricsAggregator::new(FixturePlatform::new(HealthFixture::default()));
        let partial: GrantedPermissionSet = REQUIRED_PERMISSIONS[..2].iter().copied().collect();

        let err = aggregator.fetch_last_24_hours(&partial).await.unwrap_err();
        assert!(matches!(err, DashboardError::Permission { ref missing } if missing.len() == 2));
        assert_eq!(aggregator.platform().read_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_window_aggregates_all_types() {
        let fixture = HealthFixture::default()
            .with_records(
                RecordType::Steps,
                vec![json!({ "count": 100 }), json!({ "count": 250 }), json!({ "count": 50 })],
            )
            .with_records(
                RecordType::ActiveCaloriesBurned,
                vec![
                    json!({ "energy": { "inKilocalories": 120.4 } }),
                    json!({ "energy": { "inKilocalories": 80.1 } }),
                ],
            )
            .with_records(
                RecordType::HeartRate,
                vec![
                    json!({ "beatsPerMinute": 61, "startTime": "2024-03-01T07:00:00Z" }),
                    json!({ "beatsPerMinute": 83, "startTime": "2024-03-01T18:00:00Z" }),
                ],
            )
            .with_records(
                RecordType::SleepSession,
                vec![json!({ "startTime": "2024-03-01T00:00:00Z", "endTime": "2024-03-01T07:30:00Z" })],
            );
        let aggregator = MetricsAggregator::new(FixturePlatform::new(fixture));

        let end = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let outcome = aggregator.fetch_until(&all_granted(), end).await.unwrap();

        assert_eq!(
            outcome.snapshot,
            MetricsSnapshot {
                steps: 400,
                calories: 201,
                heart_rate: 83,
                sleep_minutes: 450,
            }
        );
        assert_eq!(outcome.window_end, end);
        assert_eq!(aggregator.platform().read_calls(), 4);
    }

    #[tokio::test]
    async fn test_any_failed_read_aborts_fetch() {
        let fixture = HealthFixture::default()
            .with_records(RecordType::Steps, vec![json!({ "count": 10 })])
            .with_failure("SleepSession", "Health Connect unavailable");
        let aggregator = MetricsAggregator::new(FixturePlatform::new(fixture));

        let err = aggregator.fetch_last_24_hours(&all_granted()).await.unwrap_err();
        assert!(matches!(err, DashboardError::Fetch(ref m) if m == "Health Connect unavailable"));
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_a_fetch_error() {
        let aggregator =
            MetricsAggregator::new(FixturePlatform::new(HealthFixture::default())).with_window_hours(u32::MAX);

        let err = aggregator.fetch_last_24_hours(&all_granted()).await.unwrap_err();
        assert!(matches!(err, DashboardError::Fetch(ref m) if m.contains("out of range")));
        assert_eq!(aggregator.platform().read_calls(), 0);
    }

    #[tokio::test]
    async fn test_window_length_is_configurable() {
        let fixture = HealthFixture::default().with_records(
            RecordType::Steps,
            vec![
                json!({ "count": 1, "startTime": "2024-03-01T19:00:00Z", "endTime": "2024-03-01T19:30:00Z" }),
                json!({ "count": 2, "startTime": "2024-03-01T10:00:00Z", "endTime": "2024-03-01T10:30:00Z" }),
            ],
        );
        let aggregator = MetricsAggregator::new(FixturePlatform::new(fixture)).with_window_hours(2);

        let end = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let outcome = aggregator.fetch_until(&all_granted(), end).await.unwrap();
        assert_eq!(outcome.snapshot.steps, 1);
    }
}
