//! Fetch Metrics
//!
//! Tracks fetch success rate, permission denials, and fetch duration for the
//! lifetime of the process. Nothing here is written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of fetch records retained
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchResult {
    Success,
    PermissionDenied,
    Failed,
}

/// Single trigger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRecord {
    pub timestamp: DateTime<Utc>,
    pub result: FetchResult,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMetrics {
    pub total_fetches: u64,
    pub successful_fetches: u64,
    pub failed_fetches: u64,
    pub permission_denials: u64,
    pub ignored_triggers: u64,
    pub last_fetch: Option<DateTime<Utc>>,
    pub average_fetch_duration_ms: Option<u64>,
    pub history: Vec<FetchRecord>,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed trigger
    pub fn record(&mut self, result: FetchResult, duration_ms: u64, error: Option<String>) {
        self.total_fetches += 1;

        match result {
            FetchResult::Success => self.successful_fetches += 1,
            FetchResult::Failed => self.failed_fetches += 1,
            FetchResult::PermissionDenied => self.permission_denials += 1,
        }

        let now = Utc::now();
        self.last_fetch = Some(now);

        // Update rolling average
        let total = self.total_fetches;
        if let Some(avg) = self.average_fetch_duration_ms {
            self.average_fetch_duration_ms = Some(((avg * (total - 1)) + duration_ms) / total);
        } else {
            self.average_fetch_duration_ms = Some(duration_ms);
        }

        self.history.push(FetchRecord {
            timestamp: now,
            result,
            duration_ms,
            error,
        });

        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }

    /// A trigger dropped by the single-flight rule
    pub fn record_ignored(&mut self) {
        self.ignored_triggers += 1;
    }

    /// Success rate as percentage of completed triggers
    pub fn success_rate(&self) -> f64 {
        if self.total_fetches == 0 {
            return 100.0;
        }
        (self.successful_fetches as f64 / self.total_fetches as f64) * 100.0
    }
}
