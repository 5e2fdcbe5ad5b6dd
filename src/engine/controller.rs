//! Dashboard Controller
//!
//! Owns the session manager, the aggregator and the published state, and runs
//! the trigger-fetch flow:
//!
//! `Idle -> RequestingPermission -> Fetching -> {Success, Error}`
//!
//! Every transition is published to subscribers. Errors never escape as values
//! the presentation layer has to handle; they land in `SessionState::error`.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::aggregator::{FetchOutcome, MetricsAggregator, DEFAULT_WINDOW_HOURS};
use super::config::DashboardConfig;
use super::error::{DashboardError, Result};
use super::observability::{FetchMetrics, FetchResult};
use super::observer::{StatePublisher, SubscriptionId};
use super::permissions::{GrantedPermissionSet, PermissionRequirement};
use super::platform::HealthPlatform;
use super::session::{RevokeNotice, SessionManager};
use super::state::{FetchPhase, MetricsSnapshot, SessionState};

pub const ANDROID_ONLY_MESSAGE: &str = "Health Connect is Android-only";
pub const PERMISSIONS_DENIED_MESSAGE: &str = "Some permissions denied";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What a trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another trigger was already running
    Ignored,
    /// A revoke landed while the fetch was outstanding; its result was dropped
    Discarded,
    Fetched(FetchOutcome),
    PermissionDenied(Vec<PermissionRequirement>),
    Failed(String),
}

/// Clears the in-flight flag when the trigger ends, however it ends
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DashboardController<P: HealthPlatform> {
    platform: Arc<P>,
    session: tokio::sync::Mutex<SessionManager<Arc<P>>>,
    aggregator: MetricsAggregator<Arc<P>>,
    state: Mutex<SessionState>,
    publisher: StatePublisher,
    metrics: Mutex<FetchMetrics>,
    in_flight: AtomicBool,
    /// Bumped by revoke so a fetch started before it cannot publish after it
    generation: AtomicU64,
    clock: Clock,
}

impl<P: HealthPlatform> DashboardController<P> {
    pub fn new(platform: P) -> Self {
        let platform = Arc::new(platform);
        Self {
            session: tokio::sync::Mutex::new(SessionManager::new(Arc::clone(&platform))),
            aggregator: MetricsAggregator::new(Arc::clone(&platform)).with_window_hours(DEFAULT_WINDOW_HOURS),
            platform,
            state: Mutex::new(SessionState::default()),
            publisher: StatePublisher::new(),
            metrics: Mutex::new(FetchMetrics::new()),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(platform: P, config: &DashboardConfig) -> Self {
        Self::new(platform).with_window_hours(config.window_hours)
    }

    pub fn with_window_hours(mut self, hours: u32) -> Self {
        self.aggregator = self.aggregator.with_window_hours(hours);
        self
    }

    /// Replace the wall clock used to end the accumulation window
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Length of the accumulation window
    pub fn window_hours(&self) -> u32 {
        self.aggregator.window_hours()
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn metrics(&self) -> FetchMetrics {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Grants as last reported by the platform
    pub async fn granted(&self) -> GrantedPermissionSet {
        self.session.lock().await.granted().clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.publisher.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    /// Initialize the platform service and load its current grants
    pub async fn start(&self) -> Result<()> {
        if !self.platform.host_supported() {
            let err = DashboardError::PlatformUnsupported(ANDROID_ONLY_MESSAGE.to_string());
            self.fail(&err);
            return Err(err);
        }

        let mut session = self.session.lock().await;
        let initialized = session.initialize().await;
        match initialized {
            Ok(()) => {
                let has_permissions = session.has_permissions();
                drop(session);
                self.update(|state| {
                    state.has_permissions = has_permissions;
                    state.success = false;
                });
                Ok(())
            }
            Err(err) => {
                drop(session);
                tracing::warn!(error = %err, "Initialization failed");
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Re-read grants from the platform, e.g. after the user returns from settings
    pub async fn refresh_permissions(&self) -> Result<bool> {
        let mut session = self.session.lock().await;
        let refreshed = session.refresh_granted().await;
        match refreshed {
            Ok(()) => {
                let has_permissions = session.has_permissions();
                drop(session);
                self.set_permissions(has_permissions);
                Ok(has_permissions)
            }
            Err(err) => {
                drop(session);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Request permissions if needed, then fetch. Ignored while one is running.
    pub async fn trigger_fetch(&self) -> TriggerOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Fetch already in flight, ignoring trigger");
            self.metrics
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_ignored();
            return TriggerOutcome::Ignored;
        };

        if !self.platform.host_supported() {
            let err = DashboardError::PlatformUnsupported(ANDROID_ONLY_MESSAGE.to_string());
            self.fail(&err);
            return TriggerOutcome::Failed(err.to_string());
        }

        let started = Instant::now();
        let generation = self.generation.load(Ordering::Acquire);

        let permissions = match self.ensure_permissions().await {
            Ok(permissions) => permissions,
            Err(DashboardError::Permission { missing }) => {
                self.record(FetchResult::PermissionDenied, started, Some(PERMISSIONS_DENIED_MESSAGE.to_string()));
                return TriggerOutcome::PermissionDenied(missing);
            }
            Err(err) => {
                self.record(FetchResult::Failed, started, Some(err.to_string()));
                return TriggerOutcome::Failed(err.to_string());
            }
        };

        self.update(|state| {
            state.phase = FetchPhase::Fetching;
            state.error = None;
            state.success = false;
        });
        tracing::info!("Fetching health metrics");

        let end = (self.clock)();
        match self.aggregator.fetch_until(&permissions, end).await {
            Ok(outcome) => {
                if self.generation.load(Ordering::Acquire) != generation {
                    tracing::info!("Access revoked during fetch, dropping result");
                    return TriggerOutcome::Discarded;
                }
                self.update(|state| {
                    state.apply_snapshot(outcome.snapshot);
                    state.data_timestamp = Some(outcome.window_end);
                    state.success = true;
                    state.error = None;
                    state.phase = FetchPhase::Success;
                });
                self.record(FetchResult::Success, started, None);
                TriggerOutcome::Fetched(outcome)
            }
            Err(err) => {
                if self.generation.load(Ordering::Acquire) != generation {
                    return TriggerOutcome::Discarded;
                }
                tracing::warn!(error = %err, "Fetch failed");
                self.fail(&err);
                self.record(FetchResult::Failed, started, Some(err.to_string()));
                TriggerOutcome::Failed(err.to_string())
            }
        }
    }

    /// Same flow as `trigger_fetch`
    pub async fn refetch(&self) -> TriggerOutcome {
        self.trigger_fetch().await
    }

    /// Clear grants and metrics locally and tell the user how to finish in Health Connect
    pub async fn revoke_access(&self) -> RevokeNotice {
        let mut session = self.session.lock().await;
        let notice = session.revoke();
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.update(|state| {
            state.apply_snapshot(MetricsSnapshot::default());
            state.has_permissions = false;
            state.success = false;
            state.error = None;
            state.data_timestamp = None;
            state.phase = FetchPhase::Idle;
        });
        drop(session);
        notice
    }

    /// Granted set to fetch with: the cached one if sufficient, else a fresh prompt.
    /// The fresh answer is used directly rather than re-read from the cache.
    ///
    /// The published permission flag is written under the session lock so a
    /// concurrent revoke cannot be overwritten by a stale grant.
    async fn ensure_permissions(&self) -> Result<GrantedPermissionSet> {
        let mut session = self.session.lock().await;
        if session.has_permissions() {
            return Ok(session.granted().clone());
        }

        self.update(|state| state.phase = FetchPhase::RequestingPermission);
        let requested = session.request_permissions().await;
        match requested {
            Ok(grant) => {
                self.set_permissions(grant.satisfied);
                if grant.satisfied {
                    Ok(grant.granted)
                } else {
                    let missing = grant.granted.missing();
                    self.update(|state| {
                        state.error = Some(PERMISSIONS_DENIED_MESSAGE.to_string());
                        state.phase = FetchPhase::Error {
                            message: PERMISSIONS_DENIED_MESSAGE.to_string(),
                        };
                    });
                    Err(DashboardError::Permission { missing })
                }
            }
            Err(err) => {
                let has_permissions = session.has_permissions();
                self.update(|state| state.has_permissions = has_permissions);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// A permission change always clears `success`
    fn set_permissions(&self, has_permissions: bool) {
        self.update(|state| {
            state.has_permissions = has_permissions;
            state.success = false;
        });
    }

    /// Store the error as a message; the snapshot is left alone
    fn fail(&self, err: &DashboardError) {
        let message = err.to_string();
        self.update(|state| {
            state.error = Some(message.clone());
            state.success = false;
            state.phase = FetchPhase::Error { message };
        });
    }

    fn record(&self, result: FetchResult, started: Instant, error: Option<String>) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(result, started.elapsed().as_millis() as u64, error);
    }

    /// Mutate the state, then publish a copy outside the lock
    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) {
        let published = {
            let mut state = self.lock_state();
            f(&mut state);
            state.clone()
        };
        self.publisher.publish(&published);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
