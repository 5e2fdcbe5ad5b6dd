//! Dashboard State
//!
//! The snapshot of aggregated metrics, the fetch state machine, and the state
//! object published to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated metrics for one accumulation window; replaced as a unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub steps: u64,
    /// Kilocalories, rounded half-up
    pub calories: u64,
    /// Beats per minute of the latest sample, 0 if none
    pub heart_rate: u32,
    /// Minutes, rounded half-up
    pub sleep_minutes: u64,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sleep in hours, one decimal
    pub fn sleep_hours(&self) -> f64 {
        (self.sleep_minutes as f64 / 60.0 * 10.0).round() / 10.0
    }
}

/// Where the trigger-fetch flow currently is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchPhase {
    /// Nothing attempted yet, or reset by revoke
    #[default]
    Idle,
    /// Waiting on the platform permission prompt
    RequestingPermission,
    /// Record queries outstanding
    Fetching,
    Success,
    Error { message: String },
}

impl FetchPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FetchPhase::RequestingPermission | FetchPhase::Fetching)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchPhase::Success | FetchPhase::Error { .. })
    }
}

/// Everything the presentation layer renders from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub steps: u64,
    pub calories: u64,
    pub heart_rate: u32,
    pub sleep: u64,
    pub error: Option<String>,
    pub has_permissions: bool,
    /// Set only while the displayed snapshot is confirmed fresh
    pub success: bool,
    pub data_timestamp: Option<DateTime<Utc>>,
    pub phase: FetchPhase,
}

impl SessionState {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps: self.steps,
            calories: self.calories,
            heart_rate: self.heart_rate,
            sleep_minutes: self.sleep,
        }
    }

    /// Replace all four metrics at once
    pub fn apply_snapshot(&mut self, snapshot: MetricsSnapshot) {
        self.steps = snapshot.steps;
        self.calories = snapshot.calories;
        self.heart_rate = snapshot.heart_rate;
        self.sleep = snapshot.sleep_minutes;
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::of(self)
    }
}

/// Which screen variant the presentation layer should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardView {
    /// An error banner is up
    Error,
    /// Access to Health Connect has not been granted
    NoPermission,
    /// Fetch succeeded but the window held no data
    NoData,
    /// Metric cards, possibly stale
    Populated,
    /// Permissions held, nothing fetched yet
    Pending,
}

impl DashboardView {
    pub fn of(state: &SessionState) -> Self {
        let snapshot = state.snapshot();
        if state.error.is_some() {
            DashboardView::Error
        } else if !state.has_permissions {
            DashboardView::NoPermission
        } else if state.success && snapshot.is_empty() {
            DashboardView::NoData
        } else if !snapshot.is_empty() {
            DashboardView::Populated
        } else {
            DashboardView::Pending
        }
    }
}
