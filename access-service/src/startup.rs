use crate::config::{AccessConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    AlertAggregator, AlertStore, AuthorizationEngine, DeviceGateway, DoorController,
    HttpDoorController, IdentityResolver, JwtVerifier, MemoryStore, MongoDb, RoutineEngine,
    RoutineStore, TenancyStore, TokenVerifier,
};
use crate::workers::RoutineScheduler;
use access_core::error::AppError;
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    /// Present only on the Mongo backend; used by the health probe.
    pub db: Option<MongoDb>,
    pub tenancy: Arc<dyn TenancyStore>,
    pub identity: Arc<IdentityResolver>,
    pub authz: Arc<AuthorizationEngine>,
    pub routines: Arc<RoutineEngine>,
    pub gateway: Arc<DeviceGateway>,
    pub alerts: Arc<AlertAggregator>,
}

/// Storage backends behind the component seams. Kept separate from
/// `build_state` so tests can wire in the in-memory store and fakes.
pub struct Backends {
    pub db: Option<MongoDb>,
    pub tenancy: Arc<dyn TenancyStore>,
    pub routine_store: Arc<dyn RoutineStore>,
    pub alert_store: Arc<dyn AlertStore>,
}

impl Backends {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            db: None,
            tenancy: store.clone(),
            routine_store: store.clone(),
            alert_store: store,
        }
    }
}

pub fn build_state(
    config: AccessConfig,
    backends: Backends,
    verifier: Arc<dyn TokenVerifier>,
    controller: Arc<dyn DoorController>,
) -> AppState {
    let alerts = Arc::new(AlertAggregator::new(backends.alert_store));
    let gateway = Arc::new(DeviceGateway::new(
        controller,
        backends.tenancy.clone(),
        alerts.clone(),
        config.device.sync_timeout(),
    ));
    let identity = Arc::new(IdentityResolver::new(
        verifier,
        backends.tenancy.clone(),
        config.auth.cache_window(),
        config.auth.platform_admins.clone(),
    ));
    let authz = Arc::new(AuthorizationEngine::new(backends.tenancy.clone()));
    let routines = Arc::new(RoutineEngine::new(
        backends.tenancy.clone(),
        backends.routine_store,
        gateway.clone(),
        alerts.clone(),
    ));

    AppState {
        config,
        db: backends.db,
        tenancy: backends.tenancy,
        identity,
        authz,
        routines,
        gateway,
        alerts,
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/organizations", post(handlers::create_organization))
        .route(
            "/organizations/:id",
            get(handlers::get_organization).delete(handlers::delete_organization),
        )
        .route(
            "/organizations/:id/members/:principal_id",
            put(handlers::upsert_member).delete(handlers::remove_member),
        )
        .route(
            "/organizations/:id/locations",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route(
            "/principals/:id/disabled",
            put(handlers::set_principal_disabled),
        )
        .route(
            "/locations/:id",
            get(handlers::get_location).delete(handlers::delete_location),
        )
        .route(
            "/locations/:id/access-points",
            get(handlers::list_access_points).post(handlers::create_access_point),
        )
        .route(
            "/locations/:id/routines",
            get(handlers::list_routines).post(handlers::create_routine),
        )
        .route("/routines/:id/enabled", put(handlers::set_routine_enabled))
        .route("/routines/:id", delete(handlers::delete_routine))
        .route(
            "/access-points/:id",
            get(handlers::get_access_point).delete(handlers::delete_access_point),
        )
        .route("/access-points/:id/state", post(handlers::apply_state))
        .route("/alerts", get(handlers::list_alerts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
    scheduler_shutdown: CancellationToken,
}

impl Application {
    pub async fn build(config: AccessConfig) -> Result<Self, AppError> {
        let backends = match config.store.backend {
            StoreBackend::Mongo => {
                let db =
                    MongoDb::connect(&config.store.mongodb_uri, &config.store.mongodb_database)
                        .await?;
                db.initialize_indexes().await?;
                let shared: Arc<MongoDb> = Arc::new(db.clone());
                Backends {
                    db: Some(db),
                    tenancy: shared.clone(),
                    routine_store: shared.clone(),
                    alert_store: shared,
                }
            }
            StoreBackend::Memory => Backends::in_memory(),
        };

        let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));
        let controller: Arc<dyn DoorController> = Arc::new(HttpDoorController::new(
            &config.device.controller_url,
            config.device.sync_timeout(),
        ));

        let state = build_state(config.clone(), backends, verifier, controller);

        let scheduler_shutdown = CancellationToken::new();
        if config.scheduler.enabled {
            let scheduler = RoutineScheduler::new(
                state.routines.clone(),
                &state.alerts,
                config.scheduler.tick(),
                scheduler_shutdown.clone(),
            );
            tokio::spawn(scheduler.run());
        } else {
            tracing::info!("Routine scheduler disabled by configuration");
        }

        let app = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
            scheduler_shutdown,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler_shutdown(&self) -> CancellationToken {
        self.scheduler_shutdown.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
