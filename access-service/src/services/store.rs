use crate::models::{
    AccessPoint, Alert, AlertScope, Location, LockState, Membership, Organization,
    PrincipalRecord, ResourceRef, Role, Routine, Severity,
};
use access_core::error::AppError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, TimeZone, Utc};

/// Persistence contract for the tenancy graph. Backends guarantee
/// referential integrity: children require an existing parent, and parents
/// cannot be deleted while children exist (cascades are explicit, never
/// implicit).
#[async_trait]
pub trait TenancyStore: Send + Sync {
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<(), AppError>;
    async fn find_principal(&self, id: &str) -> Result<Option<PrincipalRecord>, AppError>;
    /// Principals are never hard-deleted; this is the soft-disable switch.
    async fn set_principal_disabled(&self, id: &str, disabled: bool) -> Result<(), AppError>;

    async fn insert_organization(&self, organization: &Organization) -> Result<(), AppError>;
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, AppError>;
    /// Fails with `Conflict` while the organization still owns locations.
    /// Membership records go with the organization.
    async fn delete_organization(&self, id: &str) -> Result<(), AppError>;

    /// Fails with `NotFound` when the owning organization does not exist.
    async fn insert_location(&self, location: &Location) -> Result<(), AppError>;
    async fn find_location(&self, id: &str) -> Result<Option<Location>, AppError>;
    async fn list_locations(&self, organization_id: &str) -> Result<Vec<Location>, AppError>;
    /// Fails with `Conflict` while access points or routines remain.
    async fn delete_location(&self, id: &str) -> Result<(), AppError>;

    /// Fails with `NotFound` when the owning location does not exist.
    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError>;
    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError>;
    async fn list_access_points(&self, location_id: &str) -> Result<Vec<AccessPoint>, AppError>;
    async fn update_access_point_state(
        &self,
        id: &str,
        state: LockState,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
    async fn delete_access_point(&self, id: &str) -> Result<(), AppError>;

    /// Last-write-wins per (organization, principal) pair; callers that pass
    /// `expected_version` get `Conflict` on mismatch instead.
    async fn upsert_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
        role: Role,
        expected_version: Option<i64>,
    ) -> Result<Membership, AppError>;
    async fn find_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<Option<Membership>, AppError>;
    async fn memberships_for_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Membership>, AppError>;
    async fn remove_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<(), AppError>;

    /// Walks AccessPoint -> Location -> Organization (or shorter) and fails
    /// with `NotFound` when any link is missing.
    async fn resolve_owning_organization(
        &self,
        resource: &ResourceRef,
    ) -> Result<String, AppError>;
}

#[async_trait]
pub trait RoutineStore: Send + Sync {
    async fn insert_routine(&self, routine: &Routine) -> Result<(), AppError>;
    async fn find_routine(&self, id: &str) -> Result<Option<Routine>, AppError>;
    async fn list_routines(&self, location_id: &str) -> Result<Vec<Routine>, AppError>;
    async fn list_enabled_routines(&self) -> Result<Vec<Routine>, AppError>;
    async fn set_routine_enabled(&self, id: &str, enabled: bool) -> Result<(), AppError>;
    async fn delete_routine(&self, id: &str) -> Result<(), AppError>;
}

/// Append-only alert log with a time-ordered, cursor-restartable query side.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn append_alert(&self, alert: &Alert) -> Result<(), AppError>;
    async fn query_alerts(&self, query: &AlertQuery) -> Result<AlertPage, AppError>;
}

#[derive(Debug, Clone)]
pub struct AlertQuery {
    pub scope: AlertScope,
    pub since: Option<DateTime<Utc>>,
    pub severity_floor: Severity,
    pub cursor: Option<AlertCursor>,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    /// Present when more results remain; feed back in to continue the scan.
    pub next_cursor: Option<String>,
}

/// Opaque pagination position: the (created_at, id) pair of the last alert
/// returned, base64-encoded so clients can treat it as a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl AlertCursor {
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_millis(), self.id);
        general_purpose::URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        let raw = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| AppError::Invalid(anyhow::anyhow!("Malformed cursor: {}", e)))?;
        let raw = String::from_utf8(raw)
            .map_err(|e| AppError::Invalid(anyhow::anyhow!("Malformed cursor: {}", e)))?;
        let (millis, id) = raw
            .split_once(':')
            .ok_or_else(|| AppError::Invalid(anyhow::anyhow!("Malformed cursor")))?;
        let millis: i64 = millis
            .parse()
            .map_err(|_| AppError::Invalid(anyhow::anyhow!("Malformed cursor")))?;
        let created_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| AppError::Invalid(anyhow::anyhow!("Malformed cursor")))?;
        Ok(Self {
            created_at,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = AlertCursor {
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
            id: "alert-42".to_string(),
        };
        let decoded = AlertCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn garbage_cursor_is_invalid() {
        let err = AlertCursor::decode("not-a-cursor!!").unwrap_err();
        assert_eq!(err.kind(), "invalid");
    }
}
