use crate::startup::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match &state.db {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    if store_ok {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "access-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "access-service"
            })),
        )
    }
}
