use crate::models::{Routine, RoutineAction, Trigger};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoutineRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub trigger: Trigger,
    pub targets: Vec<String>,
    pub action: RoutineAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SetRoutineEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RoutineResponse {
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub trigger: Trigger,
    pub targets: Vec<String>,
    pub action: RoutineAction,
    pub enabled: bool,
    pub created_at: String,
}

impl From<Routine> for RoutineResponse {
    fn from(routine: Routine) -> Self {
        Self {
            id: routine.id,
            location_id: routine.location_id,
            name: routine.name,
            trigger: routine.trigger,
            targets: routine.targets,
            action: routine.action,
            enabled: routine.enabled,
            created_at: routine.created_at.to_rfc3339(),
        }
    }
}
