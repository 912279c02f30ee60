use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Member role within an organization. Declaration order is privilege order:
/// every capability of a lower variant is included in the higher ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
    Owner,
}

/// Requested action on a resource, checked against the role total order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Administer,
}

impl Action {
    /// Minimum role required to perform this action.
    pub fn required_role(self) -> Role {
        match self {
            Action::Read => Role::Viewer,
            Action::Write => Role::Operator,
            Action::Administer => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
        }
    }
}

/// Membership record, keyed by the (organization_id, principal_id) composite.
/// `version` increments on every write and serves as the optimistic
/// concurrency token for callers that opt into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: String,
    pub principal_id: String,
    pub role: Role,
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(organization_id: String, principal_id: String, role: Role) -> Self {
        Self {
            organization_id,
            principal_id,
            role,
            version: 1,
            updated_at: Utc::now(),
        }
    }
}
