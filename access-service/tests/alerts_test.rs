//! Alert aggregator tests: query filters, cursor pagination and the live
//! event feed.

mod common;

use access_service::models::{Alert, AlertScope, AlertSource, Severity};
use access_service::services::store::{AlertCursor, AlertQuery};
use access_service::services::AlertStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::spawn_app;

fn org_scope(organization_id: &str) -> AlertScope {
    AlertScope::Organization {
        organization_id: organization_id.to_string(),
    }
}

fn alert_at(id: &str, scope: AlertScope, severity: Severity, created_at: DateTime<Utc>) -> Alert {
    Alert {
        id: id.to_string(),
        scope,
        source: AlertSource::System,
        severity,
        message: format!("alert {}", id),
        created_at,
    }
}

fn query(scope: AlertScope) -> AlertQuery {
    AlertQuery {
        scope,
        since: None,
        severity_floor: Severity::Info,
        cursor: None,
        limit: 50,
    }
}

#[tokio::test]
async fn pagination_is_restartable_from_the_cursor() {
    let app = spawn_app();
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    for i in 1..=5 {
        app.store
            .append_alert(&alert_at(
                &format!("alert-{}", i),
                org_scope("org-1"),
                Severity::Info,
                base + Duration::milliseconds(i),
            ))
            .await
            .unwrap();
    }

    let mut q = query(org_scope("org-1"));
    q.limit = 2;

    // Newest first.
    let page = app.state.alerts.query(&q).await.unwrap();
    let ids: Vec<&str> = page.alerts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["alert-5", "alert-4"]);
    let cursor = page.next_cursor.expect("more pages remain");

    q.cursor = Some(AlertCursor::decode(&cursor).unwrap());
    let page = app.state.alerts.query(&q).await.unwrap();
    let ids: Vec<&str> = page.alerts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["alert-3", "alert-2"]);
    let cursor = page.next_cursor.expect("one page left");

    q.cursor = Some(AlertCursor::decode(&cursor).unwrap());
    let page = app.state.alerts.query(&q).await.unwrap();
    let ids: Vec<&str> = page.alerts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["alert-1"]);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn severity_floor_filters_lower_alerts_out() {
    let app = spawn_app();
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    for (i, severity) in [Severity::Info, Severity::Warning, Severity::Error]
        .into_iter()
        .enumerate()
    {
        app.store
            .append_alert(&alert_at(
                &format!("alert-{}", i),
                org_scope("org-1"),
                severity,
                base + Duration::seconds(i as i64),
            ))
            .await
            .unwrap();
    }

    let mut q = query(org_scope("org-1"));
    q.severity_floor = Severity::Warning;
    let page = app.state.alerts.query(&q).await.unwrap();
    assert_eq!(page.alerts.len(), 2);
    assert!(page.alerts.iter().all(|a| a.severity >= Severity::Warning));
}

#[tokio::test]
async fn scopes_are_isolated() {
    let app = spawn_app();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    app.store
        .append_alert(&alert_at("a", org_scope("org-1"), Severity::Info, at))
        .await
        .unwrap();
    app.store
        .append_alert(&alert_at("b", org_scope("org-2"), Severity::Info, at))
        .await
        .unwrap();
    app.store
        .append_alert(&alert_at("c", AlertScope::Platform, Severity::Info, at))
        .await
        .unwrap();

    let page = app.state.alerts.query(&query(org_scope("org-1"))).await.unwrap();
    assert_eq!(page.alerts.len(), 1);
    assert_eq!(page.alerts[0].id, "a");

    let page = app
        .state
        .alerts
        .query(&query(AlertScope::Platform))
        .await
        .unwrap();
    assert_eq!(page.alerts.len(), 1);
    assert_eq!(page.alerts[0].id, "c");
}

#[tokio::test]
async fn since_bounds_the_scan() {
    let app = spawn_app();
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    app.store
        .append_alert(&alert_at("old", org_scope("org-1"), Severity::Info, base))
        .await
        .unwrap();
    app.store
        .append_alert(&alert_at(
            "recent",
            org_scope("org-1"),
            Severity::Info,
            base + Duration::minutes(10),
        ))
        .await
        .unwrap();

    let mut q = query(org_scope("org-1"));
    q.since = Some(base + Duration::minutes(5));
    let page = app.state.alerts.query(&q).await.unwrap();
    assert_eq!(page.alerts.len(), 1);
    assert_eq!(page.alerts[0].id, "recent");
}

#[tokio::test]
async fn recording_feeds_live_subscribers() {
    let app = spawn_app();
    let mut feed = app.state.alerts.subscribe();

    let alert = Alert::new(
        org_scope("org-1"),
        AlertSource::System,
        Severity::Warning,
        "something happened".to_string(),
    );
    let recorded_id = app.state.alerts.record(alert.clone()).await.unwrap();
    assert_eq!(recorded_id, alert.id);

    let received = feed.recv().await.unwrap();
    assert_eq!(received.id, alert.id);
    assert_eq!(received.severity, Severity::Warning);
}
