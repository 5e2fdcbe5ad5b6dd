//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use crate::engine::permissions::{GrantedPermissionSet, REQUIRED_PERMISSIONS};
use crate::engine::session::RevokeNotice;
use crate::engine::state::{DashboardView, SessionState};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a divider
    pub fn divider() {
        println!("{}", "─".repeat(60).bright_black());
    }

    /// Print an empty line
    pub fn blank() {
        println!();
    }

    /// Render the dashboard screen for a published state
    pub fn dashboard(state: &SessionState, window_hours: u32) {
        Self::header("Health Dashboard");
        if let Some(ts) = state.data_timestamp {
            Self::kv("Last updated", &format_timestamp(ts));
        }
        Self::blank();

        match state.view() {
            DashboardView::Error => {
                if let Some(error) = &state.error {
                    Self::error(error);
                }
            }
            DashboardView::NoPermission => {
                Self::warning("Grant access to Health Connect to view your health data");
            }
            DashboardView::NoData => {
                Self::info(&no_data_message(window_hours));
            }
            DashboardView::Pending => {
                Self::info("Access granted. Fetch to load your metrics.");
            }
            DashboardView::Populated => {}
        }

        // Stale cards stay visible under an error banner
        let snapshot = state.snapshot();
        if state.has_permissions && !snapshot.is_empty() {
            Self::kv("Steps", &format_number(snapshot.steps));
            Self::kv("Calories", &format!("{} kcal", format_number(snapshot.calories)));
            Self::kv("Heart rate", &format!("{} bpm", snapshot.heart_rate));
            Self::kv(
                "Sleep",
                &format!("{:.1} hrs ({})", snapshot.sleep_hours(), format_minutes(snapshot.sleep_minutes)),
            );
            if !state.success {
                Self::warning("Showing data from the last successful fetch");
            }
        }
    }

    /// Render granted and missing permissions
    pub fn permissions(granted: &GrantedPermissionSet) {
        Self::header("Health Connect Permissions");
        for requirement in REQUIRED_PERMISSIONS.iter() {
            if granted.contains(requirement) {
                Self::success(&requirement.to_string());
            } else {
                Self::warning(&format!("{} (missing)", requirement));
            }
        }
    }

    pub fn revoke_notice(notice: &RevokeNotice) {
        Self::header(notice.title);
        Self::info(notice.message);
    }
}

pub fn no_data_message(window_hours: u32) -> String {
    let window = if window_hours == 1 {
        "hour".to_string()
    } else {
        format!("{} hours", window_hours)
    };
    format!(
        "No health data found for the last {}. Make sure your fitness tracker is syncing data.",
        window
    )
}

/// Format an integer with thousands separators
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format minutes in human-readable format
pub fn format_minutes(minutes: u64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(455), "7h 35m");
    }

    #[test]
    fn test_no_data_message_follows_window() {
        assert!(no_data_message(24).contains("last 24 hours."));
        assert!(no_data_message(6).contains("last 6 hours."));
        assert!(no_data_message(1).contains("last hour."));
    }
}
