use crate::dtos::{CreateRoutineRequest, RoutineResponse, SetRoutineEnabledRequest};
use crate::middleware::BearerToken;
use crate::models::{Action, ResourceRef};
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

pub async fn list_routines(
    State(state): State<AppState>,
    token: BearerToken,
    Path(location_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Read, &ResourceRef::location(&location_id))
        .await?;

    let routines = state.routines.list(&location_id).await?;
    let routines: Vec<RoutineResponse> = routines.into_iter().map(RoutineResponse::from).collect();
    Ok(Json(routines))
}

pub async fn create_routine(
    State(state): State<AppState>,
    token: BearerToken,
    Path(location_id): Path<String>,
    Json(payload): Json<CreateRoutineRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let principal = state.identity.resolve(&token.0).await?;
    // Authorization precedes any write; a Viewer gets Forbidden here and no
    // record is created.
    state
        .authz
        .authorize(&principal, Action::Write, &ResourceRef::location(&location_id))
        .await?;

    let routine = state
        .routines
        .create(
            &location_id,
            payload.name,
            payload.trigger,
            payload.targets,
            payload.action,
            payload.enabled,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoutineResponse::from(routine))))
}

pub async fn set_routine_enabled(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
    Json(payload): Json<SetRoutineEnabledRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;

    let routine = state
        .routines
        .find(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;
    state
        .authz
        .authorize(
            &principal,
            Action::Write,
            &ResourceRef::location(&routine.location_id),
        )
        .await?;

    state.routines.set_enabled(&id, payload.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_routine(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;

    let routine = state
        .routines
        .find(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;
    state
        .authz
        .authorize(
            &principal,
            Action::Write,
            &ResourceRef::location(&routine.location_id),
        )
        .await?;

    state.routines.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
