use crate::models::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What starts a routine firing: a cron-style schedule evaluated in the
/// owning location's timezone, or an alert observed from an access point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Schedule { cron: String },
    Event { access_point_id: String, min_severity: Severity },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoutineAction {
    Lock,
    Unlock,
    Alert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    #[serde(rename = "_id")]
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub trigger: Trigger,
    pub targets: Vec<String>,
    pub action: RoutineAction,
    pub enabled: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Routine {
    pub fn new(
        location_id: String,
        name: String,
        trigger: Trigger,
        targets: Vec<String>,
        action: RoutineAction,
        enabled: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            location_id,
            name,
            trigger,
            targets,
            action,
            enabled,
            created_at: Utc::now(),
        }
    }
}
