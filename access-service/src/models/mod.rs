mod access_point;
mod alert;
mod location;
mod organization;
mod principal;
mod routine;

pub use access_point::{AccessPoint, LockState};
pub use alert::{Alert, AlertScope, AlertSource, Severity};
pub use location::Location;
pub use organization::{Action, Membership, Organization, Role};
pub use principal::{Principal, PrincipalRecord};
pub use routine::{Routine, RoutineAction, Trigger};

use serde::{Deserialize, Serialize};

/// Reference to a resource in the tenancy graph, used by the authorization
/// engine to resolve the owning organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceRef {
    Organization { id: String },
    Location { id: String },
    AccessPoint { id: String },
}

impl ResourceRef {
    pub fn organization(id: impl Into<String>) -> Self {
        ResourceRef::Organization { id: id.into() }
    }

    pub fn location(id: impl Into<String>) -> Self {
        ResourceRef::Location { id: id.into() }
    }

    pub fn access_point(id: impl Into<String>) -> Self {
        ResourceRef::AccessPoint { id: id.into() }
    }
}
