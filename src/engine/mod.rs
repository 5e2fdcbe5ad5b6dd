// VitalDash Engine - Core module structure
pub mod aggregator;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod observability;
pub mod observer;
pub mod permissions;
pub mod platform;
pub mod records;
pub mod session;
pub mod state;

pub use aggregator::MetricsAggregator;
pub use config::DashboardConfig;
pub use controller::{DashboardController, TriggerOutcome};
pub use error::DashboardError;
pub use platform::HealthPlatform;
pub use session::SessionManager;
pub use state::{DashboardView, MetricsSnapshot, SessionState};
