use crate::dtos::{AlertListParams, AlertListResponse, AlertResponse};
use crate::middleware::BearerToken;
use crate::models::{Action, AlertScope, ResourceRef, Severity};
use crate::services::store::{AlertCursor, AlertQuery};
use crate::startup::AppState;
use access_core::error::AppError;
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;

pub async fn list_alerts(
    State(state): State<AppState>,
    token: BearerToken,
    Query(params): Query<AlertListParams>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.resolve(&token.0).await?;

    let scope = if params.scope == "platform" {
        state.authz.authorize_platform(&principal)?;
        AlertScope::Platform
    } else if let Some(organization_id) = params.scope.strip_prefix("org:") {
        state
            .authz
            .authorize(
                &principal,
                Action::Read,
                &ResourceRef::organization(organization_id),
            )
            .await?;
        AlertScope::Organization {
            organization_id: organization_id.to_string(),
        }
    } else {
        return Err(AppError::Invalid(anyhow::anyhow!(
            "Scope must be 'platform' or 'org:<id>'"
        )));
    };

    let severity_floor = match &params.severity {
        Some(raw) => raw
            .parse::<Severity>()
            .map_err(|e| AppError::Invalid(anyhow::anyhow!(e)))?,
        None => Severity::Info,
    };

    let cursor = match &params.cursor {
        Some(token) => Some(AlertCursor::decode(token)?),
        None => None,
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let page = state
        .alerts
        .query(&AlertQuery {
            scope,
            since: params.since,
            severity_floor,
            cursor,
            limit,
        })
        .await?;

    Ok(Json(AlertListResponse {
        alerts: page.alerts.into_iter().map(AlertResponse::from).collect(),
        next_cursor: page.next_cursor,
    }))
}
