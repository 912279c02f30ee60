use crate::models::{Alert, AlertScope, AlertSource, LockState, ResourceRef};
use crate::services::alerts::AlertAggregator;
use crate::services::controller::{ControllerFault, DoorCommand, DoorController};
use crate::services::store::TenancyStore;
use access_core::error::AppError;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Who asked for a device command. Alerts for routine-issued commands are
/// recorded but kept off the live event feed, so a firing can never trigger
/// an event routine and cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    Operator,
    Routine,
}

/// Translates a desired access-point state into a door-controller sync call.
/// Commands to the same access point are serialized; every call, including
/// idempotent no-ops, records exactly one alert. This is the single
/// instrumentation point for all device interactions.
pub struct DeviceGateway {
    controller: Arc<dyn DoorController>,
    store: Arc<dyn TenancyStore>,
    alerts: Arc<AlertAggregator>,
    command_locks: DashMap<String, Arc<Mutex<()>>>,
    sync_timeout: Duration,
}

impl DeviceGateway {
    pub fn new(
        controller: Arc<dyn DoorController>,
        store: Arc<dyn TenancyStore>,
        alerts: Arc<AlertAggregator>,
        sync_timeout: Duration,
    ) -> Self {
        Self {
            controller,
            store,
            alerts,
            command_locks: DashMap::new(),
            sync_timeout,
        }
    }

    pub async fn apply_state(
        &self,
        access_point_id: &str,
        desired: LockState,
        origin: CommandOrigin,
    ) -> Result<(), AppError> {
        let command = DoorCommand::for_state(desired).ok_or_else(|| {
            AppError::Invalid(anyhow::anyhow!(
                "Desired state must be locked or unlocked"
            ))
        })?;

        // Serializes concurrent commands per access point: the second caller
        // observes the first's completed state and applies idempotently.
        let lock = self
            .command_locks
            .entry(access_point_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let access_point = self
            .store
            .find_access_point(access_point_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;
        let organization_id = self
            .store
            .resolve_owning_organization(&ResourceRef::access_point(access_point_id))
            .await?;

        let scope = AlertScope::Organization { organization_id };
        let source = AlertSource::AccessPoint {
            access_point_id: access_point_id.to_string(),
        };

        if access_point.state == desired {
            metrics::counter!("device_commands_total", "result" => "noop").increment(1);
            self.record_alert(
                origin,
                Alert::new(
                    scope,
                    source,
                    crate::models::Severity::Info,
                    format!(
                        "'{}' already {}; no command issued",
                        access_point.name,
                        state_word(desired)
                    ),
                ),
            )
            .await?;
            return Ok(());
        }

        tracing::info!(
            access_point_id = %access_point_id,
            device_address = %access_point.device_address,
            command = ?command,
            "Issuing device command"
        );

        let outcome = tokio::time::timeout(
            self.sync_timeout,
            self.controller.sync(&access_point.device_address, command),
        )
        .await;

        match outcome {
            Ok(Ok(_ack)) => {
                self.store
                    .update_access_point_state(access_point_id, desired, Some(Utc::now()))
                    .await?;
                metrics::counter!("device_commands_total", "result" => "ack").increment(1);
                self.record_alert(
                    origin,
                    Alert::new(
                        scope,
                        source,
                        crate::models::Severity::Info,
                        format!("'{}' is now {}", access_point.name, state_word(desired)),
                    ),
                )
                .await?;
                Ok(())
            }
            Ok(Err(ControllerFault::Rejected(reason))) => {
                // Terminal for this attempt; the device's real state is not
                // trustworthy after a rejection.
                self.store
                    .update_access_point_state(access_point_id, LockState::Unknown, None)
                    .await?;
                metrics::counter!("device_commands_total", "result" => "rejected").increment(1);
                self.record_alert(
                    origin,
                    Alert::new(
                        scope,
                        source,
                        crate::models::Severity::Error,
                        format!(
                            "'{}' rejected {:?}: {}",
                            access_point.name, command, reason
                        ),
                    ),
                )
                .await?;
                Err(AppError::DeviceRejected(reason))
            }
            Ok(Err(ControllerFault::Unreachable(reason))) => {
                self.fail_unreachable(
                    access_point_id,
                    &access_point.name,
                    scope,
                    source,
                    reason,
                    origin,
                )
                .await
            }
            Err(_elapsed) => {
                let reason = format!(
                    "No response within {} seconds",
                    self.sync_timeout.as_secs()
                );
                self.fail_unreachable(
                    access_point_id,
                    &access_point.name,
                    scope,
                    source,
                    reason,
                    origin,
                )
                .await
            }
        }
    }

    /// Timeout and transport failures end here: the command may or may not
    /// have landed, so the cached state becomes Unknown rather than a guess,
    /// and the alert is still recorded.
    async fn fail_unreachable(
        &self,
        access_point_id: &str,
        access_point_name: &str,
        scope: AlertScope,
        source: AlertSource,
        reason: String,
        origin: CommandOrigin,
    ) -> Result<(), AppError> {
        self.store
            .update_access_point_state(access_point_id, LockState::Unknown, None)
            .await?;
        metrics::counter!("device_commands_total", "result" => "unreachable").increment(1);
        self.record_alert(
            origin,
            Alert::new(
                scope,
                source,
                crate::models::Severity::Warning,
                format!(
                    "'{}' unreachable ({}); state unknown",
                    access_point_name, reason
                ),
            ),
        )
        .await?;
        Err(AppError::DeviceUnreachable(reason))
    }

    async fn record_alert(&self, origin: CommandOrigin, alert: Alert) -> Result<String, AppError> {
        match origin {
            CommandOrigin::Operator => self.alerts.record(alert).await,
            CommandOrigin::Routine => self.alerts.record_undispatched(alert).await,
        }
    }
}

fn state_word(state: LockState) -> &'static str {
    match state {
        LockState::Locked => "locked",
        LockState::Unlocked => "unlocked",
        LockState::Unknown => "unknown",
    }
}
