use crate::dtos::{
    CreateOrganizationRequest, MembershipResponse, OrganizationResponse, UpsertMemberRequest,
};
use crate::middleware::BearerToken;
use crate::models::{Action, Organization, ResourceRef, Role};
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

/// Any authenticated principal may create an organization; the creator
/// becomes its Owner.
pub async fn create_organization(
    State(state): State<AppState>,
    token: BearerToken,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let principal = state.identity.resolve(&token.0).await?;

    let organization = Organization::new(payload.name);
    state.tenancy.insert_organization(&organization).await?;
    state
        .tenancy
        .upsert_membership(&organization.id, &principal.id, Role::Owner, None)
        .await?;

    tracing::info!(
        organization_id = %organization.id,
        owner = %principal.id,
        "Organization created"
    );

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse::from(organization)),
    ))
}

pub async fn get_organization(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Read, &ResourceRef::organization(&id))
        .await?;

    let organization = state
        .tenancy
        .find_organization(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;

    Ok(Json(OrganizationResponse::from(organization)))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(&principal, Action::Administer, &ResourceRef::organization(&id))
        .await?;

    state.tenancy.delete_organization(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upsert_member(
    State(state): State<AppState>,
    token: BearerToken,
    Path((organization_id, principal_id)): Path<(String, String)>,
    Json(payload): Json<UpsertMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(
            &principal,
            Action::Administer,
            &ResourceRef::organization(&organization_id),
        )
        .await?;

    if state.tenancy.find_principal(&principal_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!("Principal not found")));
    }

    let membership = state
        .tenancy
        .upsert_membership(
            &organization_id,
            &principal_id,
            payload.role,
            payload.expected_version,
        )
        .await?;

    tracing::info!(
        organization_id = %organization_id,
        member = %principal_id,
        role = ?membership.role,
        "Membership updated"
    );

    Ok(Json(MembershipResponse::from(membership)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    token: BearerToken,
    Path((organization_id, principal_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state
        .authz
        .authorize(
            &principal,
            Action::Administer,
            &ResourceRef::organization(&organization_id),
        )
        .await?;

    state
        .tenancy
        .remove_membership(&organization_id, &principal_id)
        .await?;

    tracing::info!(
        organization_id = %organization_id,
        member = %principal_id,
        "Membership removed"
    );
    Ok(StatusCode::NO_CONTENT)
}
