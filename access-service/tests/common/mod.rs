//! Shared fixture for access-service integration tests.
//!
//! Everything runs against the in-memory store with a scripted door
//! controller and a static token verifier, so tests need no Mongo instance
//! and no network.

#![allow(dead_code)]

use access_service::config::{
    AccessConfig, AuthConfig, DeviceConfig, SchedulerConfig, StoreBackend, StoreConfig,
};
use access_service::models::{
    AccessPoint, Alert, AlertScope, Location, Membership, Organization, Principal,
    PrincipalRecord, Role, Severity,
};
use access_service::services::store::AlertQuery;
use access_service::services::{
    ControllerFault, DoorAck, DoorCommand, DoorController, MemoryStore, TenancyStore,
    TokenVerifier, VerifiedIdentity,
};
use access_service::startup::{build_router, build_state, AppState, Backends};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use secrecy::Secret;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const PLATFORM_ADMIN: &str = "root";
pub const JWT_SECRET: &str = "test-secret";

/// Token verifier backed by a plain map; no real tokens involved.
#[derive(Default)]
pub struct StaticVerifier {
    identities: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl StaticVerifier {
    pub fn register(&self, token: &str, subject_id: &str, expires_at: chrono::DateTime<Utc>) {
        self.identities.lock().unwrap().insert(
            token.to_string(),
            VerifiedIdentity {
                subject_id: subject_id.to_string(),
                display_name: Some(subject_id.to_string()),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, access_core::error::AppError> {
        self.identities
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| {
                access_core::error::AppError::Unauthenticated(anyhow::anyhow!("Unknown token"))
            })
    }
}

/// Door controller with scripted outcomes. Results are consumed in FIFO
/// order; an empty script acknowledges every command.
#[derive(Default)]
pub struct ScriptedController {
    script: Mutex<VecDeque<Result<DoorAck, ControllerFault>>>,
    calls: Mutex<Vec<(String, DoorCommand)>>,
    call_count: AtomicUsize,
}

impl ScriptedController {
    pub fn push(&self, outcome: Result<DoorAck, ControllerFault>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(String, DoorCommand)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DoorController for ScriptedController {
    async fn sync(
        &self,
        device_address: &str,
        command: DoorCommand,
    ) -> Result<DoorAck, ControllerFault> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((device_address.to_string(), command));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(DoorAck))
    }
}

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: access_core::config::Config {
            port: 0,
            log_level: "info".to_string(),
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            mongodb_uri: String::new(),
            mongodb_database: String::new(),
        },
        auth: AuthConfig {
            jwt_secret: Secret::new(JWT_SECRET.to_string()),
            cache_window_secs: 60,
            platform_admins: vec![PLATFORM_ADMIN.to_string()],
        },
        device: DeviceConfig {
            controller_url: "http://127.0.0.1:9".to_string(),
            sync_timeout_secs: 1,
        },
        scheduler: SchedulerConfig {
            enabled: false,
            tick_secs: 30,
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub verifier: Arc<StaticVerifier>,
    pub controller: Arc<ScriptedController>,
}

pub fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let backends = Backends {
        db: None,
        tenancy: store.clone(),
        routine_store: store.clone(),
        alert_store: store.clone(),
    };
    let verifier = Arc::new(StaticVerifier::default());
    let controller = Arc::new(ScriptedController::default());
    let state = build_state(
        test_config(),
        backends,
        verifier.clone(),
        controller.clone(),
    );
    TestApp {
        state,
        store,
        verifier,
        controller,
    }
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Registers a bearer token for `principal_id`, valid for an hour.
    pub fn token_for(&self, principal_id: &str) -> String {
        let token = format!("token-{}", principal_id);
        self.verifier
            .register(&token, principal_id, Utc::now() + Duration::hours(1));
        token
    }

    pub async fn seed_principal(&self, id: &str) {
        self.store
            .insert_principal(&PrincipalRecord::new(id.to_string(), id.to_string()))
            .await
            .unwrap();
    }

    /// Creates an organization with `owner` as its Owner member.
    pub async fn seed_organization(&self, name: &str, owner: &str) -> Organization {
        self.seed_principal(owner).await;
        let organization = Organization::new(name.to_string());
        self.store.insert_organization(&organization).await.unwrap();
        self.store
            .upsert_membership(&organization.id, owner, Role::Owner, None)
            .await
            .unwrap();
        organization
    }

    pub async fn seed_member(
        &self,
        organization_id: &str,
        principal_id: &str,
        role: Role,
    ) -> Membership {
        self.seed_principal(principal_id).await;
        self.store
            .upsert_membership(organization_id, principal_id, role, None)
            .await
            .unwrap()
    }

    pub async fn seed_location(&self, organization_id: &str, name: &str, timezone: &str) -> Location {
        let location = Location::new(
            organization_id.to_string(),
            name.to_string(),
            timezone.to_string(),
        );
        self.store.insert_location(&location).await.unwrap();
        location
    }

    pub async fn seed_access_point(&self, location_id: &str, name: &str) -> AccessPoint {
        let access_point = AccessPoint::new(
            location_id.to_string(),
            name.to_string(),
            format!("device://{}", name),
        );
        self.store.insert_access_point(&access_point).await.unwrap();
        access_point
    }

    /// Builds a resolved principal with memberships read from the store, the
    /// way the identity resolver would hand it to a handler.
    pub async fn principal(&self, id: &str) -> Principal {
        let memberships = self
            .store
            .memberships_for_principal(id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.organization_id, m.role))
            .collect();
        Principal {
            id: id.to_string(),
            display_name: id.to_string(),
            platform_admin: id == PLATFORM_ADMIN,
            memberships,
        }
    }

    /// All alerts currently recorded for an organization, newest first.
    pub async fn organization_alerts(&self, organization_id: &str) -> Vec<Alert> {
        self.state
            .alerts
            .query(&AlertQuery {
                scope: AlertScope::Organization {
                    organization_id: organization_id.to_string(),
                },
                since: None,
                severity_floor: Severity::Info,
                cursor: None,
                limit: 100,
            })
            .await
            .unwrap()
            .alerts
    }
}

/// One request through the router; returns the status and the parsed body
/// (Null for empty bodies).
pub async fn request(
    router: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
