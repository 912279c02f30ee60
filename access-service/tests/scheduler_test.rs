//! Scheduler worker wiring: the live alert feed drives event triggers, and
//! cancellation stops the loop.

mod common;

use access_service::models::{LockState, RoutineAction, Severity, Trigger};
use access_service::services::{CommandOrigin, TenancyStore};
use access_service::workers::RoutineScheduler;
use common::{spawn_app, TestApp};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn wait_for_state(app: &TestApp, access_point_id: &str, expected: LockState) -> bool {
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let ap = app
            .store
            .find_access_point(access_point_id)
            .await
            .unwrap()
            .unwrap();
        if ap.state == expected {
            return true;
        }
    }
    false
}

#[tokio::test]
async fn gateway_alert_drives_an_event_routine_through_the_worker() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let sensor = app.seed_access_point(&location.id, "loading-dock").await;
    let door = app.seed_access_point(&location.id, "front-door").await;

    app.state
        .routines
        .create(
            &location.id,
            "Lockdown on dock trouble".to_string(),
            Trigger::Event {
                access_point_id: sensor.id.clone(),
                min_severity: Severity::Info,
            },
            vec![door.id.clone()],
            RoutineAction::Lock,
            true,
        )
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let scheduler = RoutineScheduler::new(
        app.state.routines.clone(),
        &app.state.alerts,
        Duration::from_secs(3600),
        shutdown.clone(),
    );
    let worker = tokio::spawn(scheduler.run());

    // A command on the sensor records an access-point alert, which the
    // worker picks up and turns into a firing against the front door.
    app.state
        .gateway
        .apply_state(&sensor.id, LockState::Unlocked, CommandOrigin::Operator)
        .await
        .unwrap();

    assert!(
        wait_for_state(&app, &door.id, LockState::Locked).await,
        "event routine never fired through the worker"
    );

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn alerts_recorded_before_the_worker_starts_are_not_lost() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let sensor = app.seed_access_point(&location.id, "loading-dock").await;
    let door = app.seed_access_point(&location.id, "front-door").await;

    app.state
        .routines
        .create(
            &location.id,
            "Lockdown on dock trouble".to_string(),
            Trigger::Event {
                access_point_id: sensor.id.clone(),
                min_severity: Severity::Info,
            },
            vec![door.id.clone()],
            RoutineAction::Lock,
            true,
        )
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let scheduler = RoutineScheduler::new(
        app.state.routines.clone(),
        &app.state.alerts,
        Duration::from_secs(3600),
        shutdown.clone(),
    );

    // The alert lands before the worker task runs; the subscription made at
    // construction buffers it.
    app.state
        .gateway
        .apply_state(&sensor.id, LockState::Unlocked, CommandOrigin::Operator)
        .await
        .unwrap();

    let worker = tokio::spawn(scheduler.run());

    assert!(
        wait_for_state(&app, &door.id, LockState::Locked).await,
        "buffered alert never reached the event routine"
    );

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn self_targeting_event_routine_fires_once_and_settles() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let door = app.seed_access_point(&location.id, "front-door").await;

    // Watches the front door and commands the front door. The firing's own
    // gateway alert must not come back around as a new event.
    app.state
        .routines
        .create(
            &location.id,
            "Relock the front door".to_string(),
            Trigger::Event {
                access_point_id: door.id.clone(),
                min_severity: Severity::Info,
            },
            vec![door.id.clone()],
            RoutineAction::Lock,
            true,
        )
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let scheduler = RoutineScheduler::new(
        app.state.routines.clone(),
        &app.state.alerts,
        Duration::from_secs(3600),
        shutdown.clone(),
    );
    let worker = tokio::spawn(scheduler.run());

    app.state
        .gateway
        .apply_state(&door.id, LockState::Unlocked, CommandOrigin::Operator)
        .await
        .unwrap();

    assert!(
        wait_for_state(&app, &door.id, LockState::Locked).await,
        "event routine never fired"
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Operator unlock, routine relock, nothing after that.
    assert_eq!(app.controller.call_count(), 2);
    // Operator alert, the firing's gateway alert, one execution alert.
    assert_eq!(app.organization_alerts(&organization.id).await.len(), 3);

    shutdown.cancel();
    worker.await.unwrap();
}
