use crate::models::{AccessPoint, Location, LockState};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// IANA timezone name, e.g. "UTC" or "Europe/Berlin".
    #[validate(length(min = 1))]
    pub timezone: String,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub timezone: String,
    pub created_at: String,
}

impl From<Location> for LocationResponse {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            organization_id: location.organization_id,
            name: location.name,
            timezone: location.timezone,
            created_at: location.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccessPointRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub device_address: String,
}

#[derive(Debug, Serialize)]
pub struct AccessPointResponse {
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub state: LockState,
    pub last_seen: Option<String>,
    pub device_address: String,
    pub created_at: String,
}

impl From<AccessPoint> for AccessPointResponse {
    fn from(access_point: AccessPoint) -> Self {
        Self {
            id: access_point.id,
            location_id: access_point.location_id,
            name: access_point.name,
            state: access_point.state,
            last_seen: access_point
                .last_seen
                .map(|seen| seen.to_chrono().to_rfc3339()),
            device_address: access_point.device_address,
            created_at: access_point.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyStateRequest {
    pub desired: LockState,
}
