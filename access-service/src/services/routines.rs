use crate::models::{
    Alert, AlertScope, AlertSource, LockState, ResourceRef, Routine, RoutineAction, Severity,
    Trigger,
};
use crate::services::alerts::AlertAggregator;
use crate::services::gateway::{CommandOrigin, DeviceGateway};
use crate::services::schedule::Schedule;
use crate::services::store::{RoutineStore, TenancyStore};
use access_core::error::AppError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use std::sync::Arc;

/// Lifecycle of a routine. `Firing` is transient and always re-enters
/// `Armed`, on success or failure alike; `Disabled` is reachable from any
/// state via explicit disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineState {
    Disabled,
    Armed,
    Firing,
}

/// Stores routines and drives their evaluation. Failures while firing are
/// recorded as alerts and swallowed per routine; one broken routine never
/// takes the engine down.
pub struct RoutineEngine {
    tenancy: Arc<dyn TenancyStore>,
    routines: Arc<dyn RoutineStore>,
    gateway: Arc<DeviceGateway>,
    alerts: Arc<AlertAggregator>,
    states: DashMap<String, RoutineState>,
}

impl RoutineEngine {
    pub fn new(
        tenancy: Arc<dyn TenancyStore>,
        routines: Arc<dyn RoutineStore>,
        gateway: Arc<DeviceGateway>,
        alerts: Arc<AlertAggregator>,
    ) -> Self {
        Self {
            tenancy,
            routines,
            gateway,
            alerts,
            states: DashMap::new(),
        }
    }

    /// Validates and persists a new routine. The caller must already have
    /// passed the authorization engine for Write on the owning location.
    pub async fn create(
        &self,
        location_id: &str,
        name: String,
        trigger: Trigger,
        targets: Vec<String>,
        action: RoutineAction,
        enabled: bool,
    ) -> Result<Routine, AppError> {
        let location = self
            .tenancy
            .find_location(location_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;

        match &trigger {
            Trigger::Schedule { cron } => {
                Schedule::parse(cron)?;
            }
            Trigger::Event { access_point_id, .. } => {
                self.require_same_organization(access_point_id, &location.organization_id)
                    .await?;
            }
        }

        if targets.is_empty() {
            return Err(AppError::Invalid(anyhow::anyhow!(
                "Routine needs at least one target access point"
            )));
        }
        for target in &targets {
            self.require_same_organization(target, &location.organization_id)
                .await?;
        }

        let routine = Routine::new(
            location_id.to_string(),
            name,
            trigger,
            targets,
            action,
            enabled,
        );
        self.routines.insert_routine(&routine).await?;
        self.states.insert(
            routine.id.clone(),
            if enabled {
                RoutineState::Armed
            } else {
                RoutineState::Disabled
            },
        );

        tracing::info!(
            routine_id = %routine.id,
            location_id = %location_id,
            enabled = enabled,
            "Routine created"
        );
        Ok(routine)
    }

    /// Routines may only point at access points inside the organization that
    /// owns the routine's location.
    async fn require_same_organization(
        &self,
        access_point_id: &str,
        organization_id: &str,
    ) -> Result<(), AppError> {
        let owner = self
            .tenancy
            .resolve_owning_organization(&ResourceRef::access_point(access_point_id))
            .await
            .map_err(|_| {
                AppError::Invalid(anyhow::anyhow!(
                    "Access point '{}' does not exist",
                    access_point_id
                ))
            })?;
        if owner != organization_id {
            return Err(AppError::Invalid(anyhow::anyhow!(
                "Access point '{}' belongs to a different organization",
                access_point_id
            )));
        }
        Ok(())
    }

    pub async fn list(&self, location_id: &str) -> Result<Vec<Routine>, AppError> {
        self.routines.list_routines(location_id).await
    }

    pub async fn find(&self, id: &str) -> Result<Option<Routine>, AppError> {
        self.routines.find_routine(id).await
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), AppError> {
        self.routines.set_routine_enabled(id, enabled).await?;
        self.states.insert(
            id.to_string(),
            if enabled {
                RoutineState::Armed
            } else {
                RoutineState::Disabled
            },
        );
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.routines.delete_routine(id).await?;
        self.states.remove(id);
        Ok(())
    }

    pub fn state_of(&self, routine: &Routine) -> RoutineState {
        self.states
            .get(&routine.id)
            .map(|s| *s)
            .unwrap_or(if routine.enabled {
                RoutineState::Armed
            } else {
                RoutineState::Disabled
            })
    }

    /// Evaluates time-based triggers over the half-open window
    /// `(window_start, now]`. Due routines run in ascending (occurrence,
    /// routine id) order, so when two routines target the same access point
    /// at the same instant the one evaluated last wins, deterministically.
    /// Returns the number of routines fired.
    pub async fn evaluate_window(
        &self,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> usize {
        let routines = match self.routines.list_enabled_routines().await {
            Ok(routines) => routines,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load routines for evaluation");
                return 0;
            }
        };

        let mut due: Vec<(DateTime<Utc>, Routine)> = Vec::new();
        for routine in routines {
            let Trigger::Schedule { cron } = &routine.trigger else {
                continue;
            };
            let schedule = match Schedule::parse(cron) {
                Ok(schedule) => schedule,
                Err(e) => {
                    tracing::warn!(routine_id = %routine.id, error = %e, "Unparseable schedule; skipping");
                    continue;
                }
            };
            let Some(tz) = self.location_timezone(&routine.location_id).await else {
                continue;
            };
            // Occurrences are computed lazily against the current timezone,
            // so a timezone change only affects future occurrences.
            if let Some(at) = schedule.next_occurrence(window_start, tz) {
                if at <= now {
                    due.push((at, routine));
                }
            }
        }

        due.sort_by(|a, b| (a.0, &a.1.id).cmp(&(b.0, &b.1.id)));

        let fired = due.len();
        for (at, routine) in due {
            tracing::info!(routine_id = %routine.id, due_at = %at, "Schedule trigger due");
            self.fire(&routine).await;
        }
        fired
    }

    /// Event-based triggers fire on an access-point-sourced alert at or
    /// above the trigger's severity floor. Alerts caused by a firing never
    /// reach this path: routine-sourced execution alerts are filtered on
    /// source, and gateway alerts for routine-issued commands are recorded
    /// off the live feed.
    pub async fn handle_event(&self, alert: &Alert) {
        let AlertSource::AccessPoint { access_point_id } = &alert.source else {
            return;
        };

        let routines = match self.routines.list_enabled_routines().await {
            Ok(routines) => routines,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load routines for event dispatch");
                return;
            }
        };

        // Store order is ascending routine id; keeps event firing
        // deterministic too.
        for routine in routines {
            let Trigger::Event {
                access_point_id: source,
                min_severity,
            } = &routine.trigger
            else {
                continue;
            };
            if source == access_point_id && alert.severity >= *min_severity {
                tracing::info!(
                    routine_id = %routine.id,
                    alert_id = %alert.id,
                    "Event trigger matched"
                );
                self.fire(&routine).await;
            }
        }
    }

    /// One firing: issue the action per target, record exactly one
    /// execution alert, re-arm. No retry within the firing; a failed target
    /// waits for the next natural trigger.
    async fn fire(&self, routine: &Routine) {
        // The routine may have been disabled or deleted since it was listed.
        match self.routines.find_routine(&routine.id).await {
            Ok(Some(current)) if current.enabled => {}
            Ok(_) => {
                tracing::debug!(routine_id = %routine.id, "Routine disabled or gone; not firing");
                return;
            }
            Err(e) => {
                tracing::error!(routine_id = %routine.id, error = %e, "Failed to re-check routine");
                return;
            }
        }

        self.states
            .insert(routine.id.clone(), RoutineState::Firing);

        let organization_id = match self
            .tenancy
            .resolve_owning_organization(&ResourceRef::location(&routine.location_id))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(routine_id = %routine.id, error = %e, "Routine owner unresolved");
                self.states.insert(routine.id.clone(), RoutineState::Armed);
                return;
            }
        };
        let scope = AlertScope::Organization {
            organization_id: organization_id.clone(),
        };
        let source = AlertSource::Routine {
            routine_id: routine.id.clone(),
        };

        let mut failures: Vec<String> = Vec::new();
        let desired = match routine.action {
            RoutineAction::Lock => Some(LockState::Locked),
            RoutineAction::Unlock => Some(LockState::Unlocked),
            RoutineAction::Alert => None,
        };

        if let Some(desired) = desired {
            for target in &routine.targets {
                if let Err(e) = self
                    .gateway
                    .apply_state(target, desired, CommandOrigin::Routine)
                    .await
                {
                    failures.push(format!("{}: {}", target, e.kind()));
                }
            }
        }

        let (severity, message) = match routine.action {
            RoutineAction::Alert => (
                Severity::Warning,
                format!(
                    "Routine '{}' raised an alert for access point(s) {}",
                    routine.name,
                    routine.targets.join(", ")
                ),
            ),
            _ if failures.is_empty() => (
                Severity::Info,
                format!(
                    "Routine '{}' applied {:?} to {} access point(s)",
                    routine.name,
                    routine.action,
                    routine.targets.len()
                ),
            ),
            _ => (
                Severity::Warning,
                format!(
                    "Routine '{}' completed with failures: {}",
                    routine.name,
                    failures.join("; ")
                ),
            ),
        };

        if let Err(e) = self
            .alerts
            .record(Alert::new(scope, source, severity, message))
            .await
        {
            tracing::error!(routine_id = %routine.id, error = %e, "Failed to record execution alert");
        }

        metrics::counter!(
            "routine_firings_total",
            "outcome" => if failures.is_empty() { "success" } else { "failure" }
        )
        .increment(1);

        self.states.insert(routine.id.clone(), RoutineState::Armed);
    }

    async fn location_timezone(&self, location_id: &str) -> Option<Tz> {
        let location = match self.tenancy.find_location(location_id).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                tracing::warn!(location_id = %location_id, "Routine's location is gone");
                return None;
            }
            Err(e) => {
                tracing::error!(location_id = %location_id, error = %e, "Failed to load location");
                return None;
            }
        };
        match location.timezone.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                tracing::warn!(
                    location_id = %location_id,
                    timezone = %location.timezone,
                    "Invalid location timezone"
                );
                None
            }
        }
    }
}
