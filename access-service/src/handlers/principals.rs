use crate::dtos::SetPrincipalDisabledRequest;
use crate::middleware::BearerToken;
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Platform-level soft disable. Memberships stay in place so re-enabling
/// restores the principal's prior access; resolved tokens already in the
/// identity cache stay valid until the cache window lapses.
pub async fn set_principal_disabled(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<String>,
    Json(payload): Json<SetPrincipalDisabledRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;
    state.authz.authorize_platform(&principal)?;

    state
        .tenancy
        .set_principal_disabled(&id, payload.disabled)
        .await?;

    tracing::info!(
        principal_id = %id,
        disabled = payload.disabled,
        "Principal disabled flag updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
