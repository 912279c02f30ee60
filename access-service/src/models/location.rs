use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "_id")]
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// IANA timezone name (e.g. "UTC", "Europe/Berlin"); validated at create.
    /// Routine schedules owned by this location are evaluated in it.
    pub timezone: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(organization_id: String, name: String, timezone: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id,
            name,
            timezone,
            created_at: Utc::now(),
        }
    }
}
