use crate::models::{
    AccessPoint, Alert, Location, LockState, Membership, Organization, PrincipalRecord,
    ResourceRef, Role, Routine,
};
use crate::services::store::{
    AlertCursor, AlertPage, AlertQuery, AlertStore, RoutineStore, TenancyStore,
};
use access_core::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory backend. Used for the `memory` store backend setting and by the
/// integration tests; mirrors the Mongo backend's semantics exactly.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    principals: HashMap<String, PrincipalRecord>,
    organizations: HashMap<String, Organization>,
    locations: HashMap<String, Location>,
    access_points: HashMap<String, AccessPoint>,
    memberships: HashMap<(String, String), Membership>,
    routines: HashMap<String, Routine>,
    alerts: Vec<Alert>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn resource_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Resource not found"))
}

#[async_trait]
impl TenancyStore for MemoryStore {
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<(), AppError> {
        self.write()
            .principals
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_principal(&self, id: &str) -> Result<Option<PrincipalRecord>, AppError> {
        Ok(self.read().principals.get(id).cloned())
    }

    async fn set_principal_disabled(&self, id: &str, disabled: bool) -> Result<(), AppError> {
        let mut inner = self.write();
        let record = inner.principals.get_mut(id).ok_or_else(resource_not_found)?;
        record.disabled = disabled;
        Ok(())
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<(), AppError> {
        self.write()
            .organizations
            .insert(organization.id.clone(), organization.clone());
        Ok(())
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, AppError> {
        Ok(self.read().organizations.get(id).cloned())
    }

    async fn delete_organization(&self, id: &str) -> Result<(), AppError> {
        let mut inner = self.write();
        if !inner.organizations.contains_key(id) {
            return Err(resource_not_found());
        }
        if inner.locations.values().any(|l| l.organization_id == id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Organization still owns locations; delete them first"
            )));
        }
        inner.organizations.remove(id);
        inner.memberships.retain(|(org, _), _| org != id);
        Ok(())
    }

    async fn insert_location(&self, location: &Location) -> Result<(), AppError> {
        let mut inner = self.write();
        if !inner.organizations.contains_key(&location.organization_id) {
            return Err(resource_not_found());
        }
        inner.locations.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn find_location(&self, id: &str) -> Result<Option<Location>, AppError> {
        Ok(self.read().locations.get(id).cloned())
    }

    async fn list_locations(&self, organization_id: &str) -> Result<Vec<Location>, AppError> {
        let mut locations: Vec<Location> = self
            .read()
            .locations
            .values()
            .filter(|l| l.organization_id == organization_id)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(locations)
    }

    async fn delete_location(&self, id: &str) -> Result<(), AppError> {
        let mut inner = self.write();
        if !inner.locations.contains_key(id) {
            return Err(resource_not_found());
        }
        if inner.access_points.values().any(|ap| ap.location_id == id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Location still owns access points; delete them first"
            )));
        }
        if inner.routines.values().any(|r| r.location_id == id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Location still owns routines; delete them first"
            )));
        }
        inner.locations.remove(id);
        Ok(())
    }

    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError> {
        let mut inner = self.write();
        if !inner.locations.contains_key(&access_point.location_id) {
            return Err(resource_not_found());
        }
        inner
            .access_points
            .insert(access_point.id.clone(), access_point.clone());
        Ok(())
    }

    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError> {
        Ok(self.read().access_points.get(id).cloned())
    }

    async fn list_access_points(&self, location_id: &str) -> Result<Vec<AccessPoint>, AppError> {
        let mut points: Vec<AccessPoint> = self
            .read()
            .access_points
            .values()
            .filter(|ap| ap.location_id == location_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(points)
    }

    async fn update_access_point_state(
        &self,
        id: &str,
        state: LockState,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut inner = self.write();
        let ap = inner
            .access_points
            .get_mut(id)
            .ok_or_else(resource_not_found)?;
        ap.state = state;
        if let Some(seen) = last_seen {
            ap.last_seen = Some(mongodb::bson::DateTime::from_chrono(seen));
        }
        Ok(())
    }

    async fn delete_access_point(&self, id: &str) -> Result<(), AppError> {
        self.write()
            .access_points
            .remove(id)
            .map(|_| ())
            .ok_or_else(resource_not_found)
    }

    async fn upsert_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
        role: Role,
        expected_version: Option<i64>,
    ) -> Result<Membership, AppError> {
        let mut inner = self.write();
        let key = (organization_id.to_string(), principal_id.to_string());
        match inner.memberships.get_mut(&key) {
            Some(existing) => {
                if let Some(expected) = expected_version {
                    if existing.version != expected {
                        return Err(AppError::Conflict(anyhow::anyhow!(
                            "Membership version mismatch: expected {}, found {}",
                            expected,
                            existing.version
                        )));
                    }
                }
                existing.role = role;
                existing.version += 1;
                existing.updated_at = Utc::now();
                Ok(existing.clone())
            }
            None => {
                if let Some(expected) = expected_version {
                    return Err(AppError::Conflict(anyhow::anyhow!(
                        "Membership version mismatch: expected {}, found none",
                        expected
                    )));
                }
                let membership = Membership::new(
                    organization_id.to_string(),
                    principal_id.to_string(),
                    role,
                );
                inner.memberships.insert(key, membership.clone());
                Ok(membership)
            }
        }
    }

    async fn find_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        let key = (organization_id.to_string(), principal_id.to_string());
        Ok(self.read().memberships.get(&key).cloned())
    }

    async fn memberships_for_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Membership>, AppError> {
        let mut memberships: Vec<Membership> = self
            .read()
            .memberships
            .values()
            .filter(|m| m.principal_id == principal_id)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| a.organization_id.cmp(&b.organization_id));
        Ok(memberships)
    }

    async fn remove_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<(), AppError> {
        let key = (organization_id.to_string(), principal_id.to_string());
        self.write()
            .memberships
            .remove(&key)
            .map(|_| ())
            .ok_or_else(resource_not_found)
    }

    async fn resolve_owning_organization(
        &self,
        resource: &ResourceRef,
    ) -> Result<String, AppError> {
        let inner = self.read();
        match resource {
            ResourceRef::Organization { id } => inner
                .organizations
                .get(id)
                .map(|o| o.id.clone())
                .ok_or_else(resource_not_found),
            ResourceRef::Location { id } => inner
                .locations
                .get(id)
                .map(|l| l.organization_id.clone())
                .ok_or_else(resource_not_found),
            ResourceRef::AccessPoint { id } => {
                let ap = inner.access_points.get(id).ok_or_else(resource_not_found)?;
                inner
                    .locations
                    .get(&ap.location_id)
                    .map(|l| l.organization_id.clone())
                    .ok_or_else(resource_not_found)
            }
        }
    }
}

#[async_trait]
impl RoutineStore for MemoryStore {
    async fn insert_routine(&self, routine: &Routine) -> Result<(), AppError> {
        self.write()
            .routines
            .insert(routine.id.clone(), routine.clone());
        Ok(())
    }

    async fn find_routine(&self, id: &str) -> Result<Option<Routine>, AppError> {
        Ok(self.read().routines.get(id).cloned())
    }

    async fn list_routines(&self, location_id: &str) -> Result<Vec<Routine>, AppError> {
        let mut routines: Vec<Routine> = self
            .read()
            .routines
            .values()
            .filter(|r| r.location_id == location_id)
            .cloned()
            .collect();
        routines.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routines)
    }

    async fn list_enabled_routines(&self) -> Result<Vec<Routine>, AppError> {
        let mut routines: Vec<Routine> = self
            .read()
            .routines
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        routines.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routines)
    }

    async fn set_routine_enabled(&self, id: &str, enabled: bool) -> Result<(), AppError> {
        let mut inner = self.write();
        let routine = inner.routines.get_mut(id).ok_or_else(resource_not_found)?;
        routine.enabled = enabled;
        Ok(())
    }

    async fn delete_routine(&self, id: &str) -> Result<(), AppError> {
        self.write()
            .routines
            .remove(id)
            .map(|_| ())
            .ok_or_else(resource_not_found)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn append_alert(&self, alert: &Alert) -> Result<(), AppError> {
        self.write().alerts.push(alert.clone());
        Ok(())
    }

    async fn query_alerts(&self, query: &AlertQuery) -> Result<AlertPage, AppError> {
        let inner = self.read();

        // Millisecond precision throughout so cursor comparisons behave the
        // same as the Mongo backend's BSON datetimes.
        let sort_key = |a: &Alert| (a.created_at.timestamp_millis(), a.id.clone());

        let mut matched: Vec<Alert> = inner
            .alerts
            .iter()
            .filter(|a| a.scope == query.scope)
            .filter(|a| a.severity >= query.severity_floor)
            .filter(|a| match query.since {
                Some(since) => a.created_at.timestamp_millis() >= since.timestamp_millis(),
                None => true,
            })
            .filter(|a| match &query.cursor {
                Some(cursor) => {
                    sort_key(a) < (cursor.created_at.timestamp_millis(), cursor.id.clone())
                }
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));

        let has_more = matched.len() > query.limit;
        matched.truncate(query.limit);

        let next_cursor = if has_more {
            matched.last().map(|last| {
                AlertCursor {
                    created_at: last.created_at,
                    id: last.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(AlertPage {
            alerts: matched,
            next_cursor,
        })
    }
}
