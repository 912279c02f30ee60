use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock state as last confirmed by the device. `Unknown` is both the initial
/// state and the fault state after an ambiguous or failed command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    #[serde(rename = "_id")]
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub state: LockState,
    pub last_seen: Option<mongodb::bson::DateTime>,
    /// Vendor-specific address used by the device gateway.
    pub device_address: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AccessPoint {
    pub fn new(location_id: String, name: String, device_address: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            location_id,
            name,
            state: LockState::Unknown,
            last_seen: None,
            device_address,
            created_at: Utc::now(),
        }
    }
}
