//! Device gateway behavior: idempotence, fault handling and the
//! one-alert-per-call rule.

mod common;

use access_service::models::{LockState, Severity};
use access_service::services::{
    CommandOrigin, ControllerFault, DoorAck, DoorCommand, DoorController, MemoryStore,
    TenancyStore,
};
use access_service::startup::{build_state, Backends};
use async_trait::async_trait;
use common::{spawn_app, test_config, ScriptedController, StaticVerifier, TestApp};
use std::sync::Arc;

async fn app_with_door() -> (TestApp, String, String) {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let door = app.seed_access_point(&location.id, "front-door").await;
    (app, organization.id, door.id)
}

#[tokio::test]
async fn ack_updates_state_and_last_seen() {
    let (app, organization_id, door_id) = app_with_door().await;

    app.state
        .gateway
        .apply_state(&door_id, LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap();

    let door = app.store.find_access_point(&door_id).await.unwrap().unwrap();
    assert_eq!(door.state, LockState::Locked);
    assert!(door.last_seen.is_some());
    assert_eq!(
        app.controller.calls(),
        vec![(door.device_address.clone(), DoorCommand::Lock)]
    );

    let alerts = app.organization_alerts(&organization_id).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Info);
}

#[tokio::test]
async fn repeated_apply_is_a_noop_without_a_device_round_trip() {
    let (app, organization_id, door_id) = app_with_door().await;

    app.state
        .gateway
        .apply_state(&door_id, LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap();
    assert_eq!(app.controller.call_count(), 1);

    // Cached state already matches; the device is not contacted again, but
    // the call still records its alert.
    app.state
        .gateway
        .apply_state(&door_id, LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap();
    assert_eq!(app.controller.call_count(), 1);

    let alerts = app.organization_alerts(&organization_id).await;
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn unreachable_device_leaves_state_unknown() {
    let (app, organization_id, door_id) = app_with_door().await;
    app.controller
        .push(Err(ControllerFault::Unreachable("link down".to_string())));

    let err = app
        .state
        .gateway
        .apply_state(&door_id, LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "device_unreachable");

    let door = app.store.find_access_point(&door_id).await.unwrap().unwrap();
    assert_eq!(door.state, LockState::Unknown);
    assert!(door.last_seen.is_none());

    let alerts = app.organization_alerts(&organization_id).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Warning);
}

#[tokio::test]
async fn rejected_command_is_terminal_for_the_attempt() {
    let (app, organization_id, door_id) = app_with_door().await;
    app.controller
        .push(Err(ControllerFault::Rejected("hardware fault".to_string())));

    let err = app
        .state
        .gateway
        .apply_state(&door_id, LockState::Unlocked, CommandOrigin::Operator)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "device_rejected");

    let door = app.store.find_access_point(&door_id).await.unwrap().unwrap();
    assert_eq!(door.state, LockState::Unknown);

    let alerts = app.organization_alerts(&organization_id).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Error);
}

#[tokio::test]
async fn unknown_is_not_a_commandable_state() {
    let (app, organization_id, door_id) = app_with_door().await;

    let err = app
        .state
        .gateway
        .apply_state(&door_id, LockState::Unknown, CommandOrigin::Operator)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid");
    assert_eq!(app.controller.call_count(), 0);
    assert!(app.organization_alerts(&organization_id).await.is_empty());
}

#[tokio::test]
async fn routine_issued_commands_stay_off_the_live_feed() {
    let (app, organization_id, door_id) = app_with_door().await;
    let mut feed = app.state.alerts.subscribe();

    app.state
        .gateway
        .apply_state(&door_id, LockState::Locked, CommandOrigin::Routine)
        .await
        .unwrap();

    // Recorded for queries, but never published to event-trigger dispatch.
    assert_eq!(app.organization_alerts(&organization_id).await.len(), 1);
    assert!(feed.try_recv().is_err());

    app.state
        .gateway
        .apply_state(&door_id, LockState::Unlocked, CommandOrigin::Operator)
        .await
        .unwrap();
    assert!(feed.try_recv().is_ok());
}

#[tokio::test]
async fn missing_access_point_is_not_found() {
    let app = spawn_app();
    let err = app
        .state
        .gateway
        .apply_state("no-such-door", LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

/// Controller that never answers; only the gateway timeout gets us out.
struct HangingController;

#[async_trait]
impl DoorController for HangingController {
    async fn sync(
        &self,
        _device_address: &str,
        _command: DoorCommand,
    ) -> Result<DoorAck, ControllerFault> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(DoorAck)
    }
}

#[tokio::test(start_paused = true)]
async fn sync_timeout_counts_as_unreachable() {
    let store = Arc::new(MemoryStore::new());
    let backends = Backends {
        db: None,
        tenancy: store.clone(),
        routine_store: store.clone(),
        alert_store: store.clone(),
    };
    let state = build_state(
        test_config(),
        backends,
        Arc::new(StaticVerifier::default()),
        Arc::new(HangingController),
    );

    let app = TestApp {
        state,
        store,
        verifier: Arc::new(StaticVerifier::default()),
        controller: Arc::new(ScriptedController::default()),
    };
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let door = app.seed_access_point(&location.id, "front-door").await;

    let err = app
        .state
        .gateway
        .apply_state(&door.id, LockState::Locked, CommandOrigin::Operator)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "device_unreachable");

    let refreshed = app.store.find_access_point(&door.id).await.unwrap().unwrap();
    assert_eq!(refreshed.state, LockState::Unknown);
}
