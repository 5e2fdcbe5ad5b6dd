//! VitalDash - Daily health metrics dashboard
//! Presentation-facing library

pub mod engine;

use engine::config::DashboardConfig;
use engine::controller::{DashboardController, TriggerOutcome};
use engine::platform::{self, HealthPlatform};
use std::sync::Arc;

pub type Controller = DashboardController<Box<dyn HealthPlatform>>;

/// Shared handle the presentation layer calls into
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}

impl AppState {
    pub fn new(platform: Box<dyn HealthPlatform>, config: &DashboardConfig) -> Self {
        Self {
            controller: Arc::new(DashboardController::from_config(platform, config)),
        }
    }

    /// Build from config, picking the platform backend it names
    pub fn from_config(config: &DashboardConfig) -> Result<Self, String> {
        let platform = platform::connect(config).map_err(|e| e.to_string())?;
        Ok(Self::new(platform, config))
    }
}

fn state_json(state: &AppState) -> Result<serde_json::Value, String> {
    let current = state.controller.state();
    let mut value = serde_json::to_value(&current).map_err(|e| e.to_string())?;
    value["view"] = serde_json::to_value(current.view()).map_err(|e| e.to_string())?;
    Ok(value)
}

fn outcome_json(state: &AppState, outcome: TriggerOutcome) -> Result<serde_json::Value, String> {
    let outcome = match outcome {
        TriggerOutcome::Ignored => "ignored",
        TriggerOutcome::Discarded => "discarded",
        TriggerOutcome::Fetched(_) => "fetched",
        TriggerOutcome::PermissionDenied(_) => "permission_denied",
        TriggerOutcome::Failed(_) => "failed",
    };
    Ok(serde_json::json!({
        "outcome": outcome,
        "state": state_json(state)?,
    }))
}

/// Initialize the platform service; failures are reported through `error`
pub async fn start(state: &AppState) -> Result<serde_json::Value, String> {
    if let Err(e) = state.controller.start().await {
        tracing::debug!(error = %e, "Start reported through state");
    }
    state_json(state)
}

pub fn get_state(state: &AppState) -> Result<serde_json::Value, String> {
    state_json(state)
}

pub async fn get_permissions(state: &AppState) -> Result<serde_json::Value, String> {
    let granted = state.controller.granted().await;
    Ok(serde_json::json!({
        "granted": granted.to_vec(),
        "missing": granted.missing(),
        "hasPermissions": engine::permissions::has_all_required(&granted),
    }))
}

pub async fn trigger_fetch(state: &AppState) -> Result<serde_json::Value, String> {
    let outcome = state.controller.trigger_fetch().await;
    outcome_json(state, outcome)
}

pub async fn refetch(state: &AppState) -> Result<serde_json::Value, String> {
    let outcome = state.controller.refetch().await;
    outcome_json(state, outcome)
}

pub async fn revoke_access(state: &AppState) -> Result<serde_json::Value, String> {
    let notice = state.controller.revoke_access().await;
    Ok(serde_json::json!({
        "notice": notice,
        "state": state_json(state)?,
    }))
}
