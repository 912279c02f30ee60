use crate::dtos::{AccessPointResponse, ApplyStateRequest};
use crate::middleware::BearerToken;
use crate::models::{Action, ResourceRef};
use crate::services::CommandOrigin;
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn get_access_point(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Read, &ResourceRef::access_point(&id))
        .await?;

    let access_point = state
        .tenancy
        .find_access_point(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;

    Ok(Json(AccessPointResponse::from(access_point)))
}

pub async fn delete_access_point(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Write, &ResourceRef::access_point(&id))
        .await?;

    state.tenancy.delete_access_point(&id).await?;
    tracing::info!(access_point_id = %id, "Access point deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Operator-issued state change, serialized against any concurrent routine
/// firing by the gateway's per-access-point lock.
pub async fn apply_state(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
    Json(payload): Json<ApplyStateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Write, &ResourceRef::access_point(&id))
        .await?;

    state
        .gateway
        .apply_state(&id, payload.desired, CommandOrigin::Operator)
        .await?;

    let access_point = state
        .tenancy
        .find_access_point(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;

    Ok(Json(AccessPointResponse::from(access_point)))
}
