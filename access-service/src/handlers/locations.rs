use crate::dtos::{
    AccessPointResponse, CreateAccessPointRequest, CreateLocationRequest, LocationResponse,
};
use crate::middleware::BearerToken;
use crate::models::{AccessPoint, Action, Location, ResourceRef};
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono_tz::Tz;
use validator::Validate;

pub async fn create_location(
    State(state): State<AppState>,
    token: BearerToken,
    Path(organization_id): Path<String>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(
            &principal,
            Action::Write,
            &ResourceRef::organization(&organization_id),
        )
        .await?;

    if payload.timezone.parse::<Tz>().is_err() {
        return Err(AppError::Invalid(anyhow::anyhow!(
            "Unknown timezone '{}'",
            payload.timezone
        )));
    }

    let location = Location::new(organization_id, payload.name, payload.timezone);
    state.tenancy.insert_location(&location).await?;

    tracing::info!(location_id = %location.id, "Location created");
    Ok((StatusCode::CREATED, Json(LocationResponse::from(location))))
}

pub async fn list_locations(
    State(state): State<AppState>,
    token: BearerToken,
    Path(organization_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(
            &principal,
            Action::Read,
            &ResourceRef::organization(&organization_id),
        )
        .await?;

    let locations = state.tenancy.list_locations(&organization_id).await?;
    let locations: Vec<LocationResponse> =
        locations.into_iter().map(LocationResponse::from).collect();
    Ok(Json(locations))
}

pub async fn get_location(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Read, &ResourceRef::location(&id))
        .await?;

    let location = state
        .tenancy
        .find_location(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;

    Ok(Json(LocationResponse::from(location)))
}

pub async fn delete_location(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Write, &ResourceRef::location(&id))
        .await?;

    state.tenancy.delete_location(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_access_point(
    State(state): State<AppState>,
    token: BearerToken,
    Path(location_id): Path<String>,
    Json(payload): Json<CreateAccessPointRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Write, &ResourceRef::location(&location_id))
        .await?;

    let access_point = AccessPoint::new(location_id, payload.name, payload.device_address);
    state.tenancy.insert_access_point(&access_point).await?;

    tracing::info!(access_point_id = %access_point.id, "Access point created");
    Ok((
        StatusCode::CREATED,
        Json(AccessPointResponse::from(access_point)),
    ))
}

pub async fn list_access_points(
    State(state): State<AppState>,
    token: BearerToken,
    Path(location_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Read, &ResourceRef::location(&location_id))
        .await?;

    let points = state.tenancy.list_access_points(&location_id).await?;
    let points: Vec<AccessPointResponse> =
        points.into_iter().map(AccessPointResponse::from).collect();
    Ok(Json(points))
}
